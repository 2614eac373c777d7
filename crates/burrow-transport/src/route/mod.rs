// ============================================
// File: crates/burrow-transport/src/route/mod.rs
// ============================================
//! # Routing Table Module
//!
//! ## Creation Reason
//! While the tunnel is up the host's default route points at the tunnel
//! gateway, and the peer itself is reached through a /32 host route via
//! the original gateway. This module is the seam for those edits.
//!
//! ## Implementations
//! - [`ip`]: `ip -4 route ...` via `tokio::process`
//! - `mock`: in-memory table recording every operation
//!
//! ## ⚠️ Important Note for Next Developer
//! - IPv4 only
//! - Every operation changes host-wide state. Callers own ordering and
//!   undo; implementations never retry or roll back on their own.
//!
//! ## Last Modified
//! v0.1.0 - Initial routing seam

use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::error::Result;

pub mod ip;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use ip::IpRouteTable;

// ============================================
// RouteTable Trait
// ============================================

/// Host IPv4 routing table operations.
#[async_trait]
pub trait RouteTable: Send + Sync {
    /// Reads the current default gateway.
    ///
    /// # Errors
    /// `NoDefaultGateway` if there is none, `RouteCommandFailed` if it
    /// cannot be read.
    async fn default_gateway(&self) -> Result<Ipv4Addr>;

    /// Installs `gateway` as the default route.
    ///
    /// # Errors
    /// `RouteCommandFailed` on failure.
    async fn set_default_gateway(&self, gateway: Ipv4Addr) -> Result<()>;

    /// Removes the current default route.
    ///
    /// # Errors
    /// `RouteCommandFailed` on failure.
    async fn clear_default_gateway(&self) -> Result<()>;

    /// Routes `host`/32 via `gateway`.
    ///
    /// # Errors
    /// `RouteCommandFailed` on failure.
    async fn set_gateway_for_host(&self, gateway: Ipv4Addr, host: Ipv4Addr) -> Result<()>;

    /// Removes the `host`/32 route.
    ///
    /// # Errors
    /// `RouteCommandFailed` on failure.
    async fn clear_gateway_for_host(&self, host: Ipv4Addr) -> Result<()>;
}
