// ============================================
// File: crates/burrow-transport/src/lib.rs
// ============================================
//! # Burrow Transport
//!
//! ## Creation Reason
//! The client touches the host in exactly three places, and each one is a
//! trait here so the session logic can run against in-memory doubles:
//!
//! | Seam | Trait | Real | Double (`mock`) |
//! |------|-------|------|-----------------|
//! | peer socket | [`Transport`] | [`UdpTransport`] | loopback UDP in tests |
//! | tunnel interface | [`TunProvider`] / [`TunDevice`] | `LinuxTunProvider` | `MockTunProvider` |
//! | routing table | [`RouteTable`] | [`IpRouteTable`] | `MockRouteTable` |
//!
//! While a session is up the host looks like this:
//! ```text
//! apps ──► default via <tunnel gw> ──► tun ──► client ──► UDP ──►
//!                                     peer/32 via <original gw> ──► peer
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - TUN and route operations need CAP_NET_ADMIN; only UDP works
//!   unprivileged, and only Linux has a TUN backend
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod route;
pub mod traits;
pub mod tun;
pub mod udp;

pub use error::{Result, TransportError, TransportErrorKind};
pub use route::{IpRouteTable, RouteTable};
pub use traits::{Transport, TunConfig, TunDevice, TunProvider};
pub use udp::UdpTransport;

#[cfg(target_os = "linux")]
pub use tun::linux::{LinuxTun, LinuxTunProvider};

#[cfg(any(test, feature = "mock"))]
pub use route::mock::{MockRouteTable, RouteOp, RouteOpKind};
#[cfg(any(test, feature = "mock"))]
pub use tun::mock::{MockTun, MockTunProvider};
