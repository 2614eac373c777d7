// ============================================
// File: crates/burrow-transport/src/tun/mod.rs
// ============================================
//! # TUN Devices
//!
//! ## Creation Reason
//! The tunnel interface only exists once the peer has granted an address,
//! so devices are produced by a [`TunProvider`](crate::traits::TunProvider)
//! rather than opened up front.
//!
//! ## Backends
//! | Backend | Where | Needs |
//! |---------|-------|-------|
//! | [`linux::LinuxTun`] | `/dev/net/tun`, `IFF_TUN \| IFF_NO_PI` | CAP_NET_ADMIN, `ip` |
//! | [`mock::MockTun`] | two in-memory queues | `mock` feature |
//!
//! Packets crossing either backend are bare IPv4/IPv6, never Ethernet.
//!
//! ## Last Modified
//! v0.1.0 - Initial TUN backends

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(any(test, feature = "mock"))]
pub mod mock;
