// ============================================
// File: crates/burrow-transport/src/traits.rs
// ============================================
//! # Host Seams
//!
//! ## Creation Reason
//! The client core only talks to the host through these traits, so the
//! handshake, relay and coordinator run unchanged against the mocks.
//!
//! ## Main Functionality
//! - `Transport`: UDP socket connected to the one peer
//! - `TunDevice`: raw IPv4 packets in and out of the virtual interface
//! - `TunProvider`: opens a device once the peer has granted an address
//! - `TunConfig`: name, granted address, prefix length, MTU
//!
//! ## ⚠️ Important Note for Next Developer
//! - Everything here is shared as `Arc<dyn ...>` between the uplink and
//!   downlink tasks; `&self` methods only
//! - `Transport::shutdown` and `TunDevice::down` are called during
//!   teardown even when a relay loop already failed on the same handle;
//!   a second call must succeed quietly
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, TransportError};

/// Prefix length the peer's address plan implies.
pub const TUNNEL_PREFIX_LEN: u8 = 24;

/// Smallest MTU an IPv4 host must accept.
const MIN_MTU: u16 = 576;

/// Largest MTU a device is configured with.
const MAX_MTU: u16 = 9000;

// ============================================
// Transport
// ============================================

/// Datagram socket that only exchanges datagrams with one peer.
///
/// ```ignore
/// transport.send(&sealed).await?;
/// let len = transport.recv(&mut buf).await?;
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Waits for the next datagram from the peer.
    ///
    /// # Errors
    /// Returns `ShuttingDown` once `shutdown` has been called, otherwise
    /// `ReceiveFailed`.
    async fn recv(&self, buf: &mut [u8]) -> Result<usize>;

    /// Sends one datagram to the peer.
    ///
    /// # Errors
    /// Returns `ShuttingDown` once `shutdown` has been called, otherwise
    /// `SendFailed`.
    async fn send(&self, buf: &[u8]) -> Result<usize>;

    /// The peer this socket is connected to.
    fn peer_addr(&self) -> SocketAddr;

    /// The local end of the socket.
    ///
    /// # Errors
    /// Returns error if the OS cannot report it.
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Stops the socket and wakes any pending `recv`.
    ///
    /// # Errors
    /// Implementations may report a failure to release the socket.
    async fn shutdown(&self) -> Result<()>;

    /// `false` after `shutdown`.
    fn is_active(&self) -> bool;
}

// ============================================
// TunDevice
// ============================================

/// Virtual interface carrying bare IPv4 packets (no link header).
#[async_trait]
pub trait TunDevice: fmt::Debug + Send + Sync {
    /// Reads the next packet the host routed into the tunnel.
    ///
    /// # Errors
    /// Returns `TunReadFailed`.
    async fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Hands a packet from the peer to the host stack.
    ///
    /// # Errors
    /// Returns `TunWriteFailed`.
    async fn write(&self, buf: &[u8]) -> Result<usize>;

    /// Interface name as the kernel knows it.
    fn name(&self) -> &str;

    /// Interface MTU.
    fn mtu(&self) -> u16;

    /// The address the peer granted.
    fn ip_addr(&self) -> Ipv4Addr;

    /// Assigns the address and sets the link up.
    ///
    /// # Errors
    /// Returns `TunConfigFailed`.
    async fn up(&self) -> Result<()>;

    /// Sets the link down.
    ///
    /// # Errors
    /// Returns `TunConfigFailed`.
    async fn down(&self) -> Result<()>;

    /// Whether `up` ran and `down` has not.
    fn is_up(&self) -> bool;
}

// ============================================
// TunProvider
// ============================================

/// Opens TUN devices.
///
/// The handshake holds a provider instead of a device because the device
/// address is only known once the Accept arrives.
#[async_trait]
pub trait TunProvider: Send + Sync {
    /// Opens a device for `config`. The link is left down.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for an unusable config, or
    /// `TunCreateFailed`.
    async fn create(&self, config: TunConfig) -> Result<Arc<dyn TunDevice>>;
}

// ============================================
// TunConfig
// ============================================

/// Settings for one TUN device.
///
/// Built from the client config without an address; the handshake fills
/// in the granted address before the device is opened.
///
/// ```
/// use burrow_transport::traits::TunConfig;
/// use std::net::Ipv4Addr;
///
/// let template = TunConfig::new("tun0").with_mtu(1400);
/// assert!(template.validate().is_err());
///
/// let config = template.with_address(Ipv4Addr::new(10, 8, 0, 7));
/// assert_eq!(config.cidr(), "10.8.0.7/24");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunConfig {
    /// Interface name, at most 15 bytes.
    pub name: String,
    /// Granted address; unspecified until the handshake completes.
    pub address: Ipv4Addr,
    /// Prefix length of the tunnel network.
    pub prefix_len: u8,
    /// Interface MTU.
    pub mtu: u16,
}

impl TunConfig {
    /// A template with no address yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: Ipv4Addr::UNSPECIFIED,
            prefix_len: TUNNEL_PREFIX_LEN,
            mtu: 1400,
        }
    }

    /// Sets the granted address.
    #[must_use]
    pub const fn with_address(mut self, address: Ipv4Addr) -> Self {
        self.address = address;
        self
    }

    /// Sets the MTU.
    #[must_use]
    pub const fn with_mtu(mut self, mtu: u16) -> Self {
        self.mtu = mtu;
        self
    }

    /// `address/prefix_len`, as `ip addr` expects it.
    #[must_use]
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.address, self.prefix_len)
    }

    /// Checks that a device can be opened with these settings.
    ///
    /// # Errors
    /// Returns `InvalidConfig` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.len() > 15 {
            return Err(TransportError::invalid_config(
                "name",
                format!("'{}' must be 1-15 bytes", self.name),
            ));
        }
        if self.address.is_unspecified() {
            return Err(TransportError::invalid_config(
                "address",
                "no address granted yet",
            ));
        }
        if self.prefix_len == 0 || self.prefix_len > 32 {
            return Err(TransportError::invalid_config(
                "prefix_len",
                format!("/{} is not a usable IPv4 prefix", self.prefix_len),
            ));
        }
        if !(MIN_MTU..=MAX_MTU).contains(&self.mtu) {
            return Err(TransportError::invalid_config(
                "mtu",
                format!("{} outside {MIN_MTU}..={MAX_MTU}", self.mtu),
            ));
        }
        Ok(())
    }
}

impl Default for TunConfig {
    fn default() -> Self {
        Self::new("tun0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn granted(name: &str) -> TunConfig {
        TunConfig::new(name).with_address(Ipv4Addr::new(10, 8, 0, 7))
    }

    #[test]
    fn test_template_has_no_address() {
        let config = TunConfig::default();
        assert_eq!(config.name, "tun0");
        assert_eq!(config.mtu, 1400);
        assert!(config.address.is_unspecified());
        assert_eq!(config.prefix_len, TUNNEL_PREFIX_LEN);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("address"));
    }

    #[test]
    fn test_cidr() {
        assert_eq!(granted("tun0").cidr(), "10.8.0.7/24");
    }

    #[test]
    fn test_validation() {
        assert!(granted("tun0").validate().is_ok());
        assert!(granted(&"a".repeat(15)).validate().is_ok());

        assert!(granted("").validate().is_err());
        assert!(granted(&"a".repeat(16)).validate().is_err());
        assert!(granted("tun0").with_mtu(575).validate().is_err());
        assert!(granted("tun0").with_mtu(576).validate().is_ok());
        assert!(granted("tun0").with_mtu(9001).validate().is_err());

        let mut config = granted("tun0");
        config.prefix_len = 33;
        assert!(config.validate().is_err());
    }
}
