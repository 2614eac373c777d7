// ============================================
// File: crates/burrow-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! The address the peer grants during the handshake is used in two
//! places: the TUN device is bound to it, and the tunnel gateway that
//! becomes the host's default route is derived from it. Wrapping it keeps
//! the derivation rule in one named place.
//!
//! ## Gateway Convention
//! The peer always grants an address out of a /24-equivalent subnet whose
//! `.1` host is the peer's own tunnel endpoint:
//! ```text
//!   assigned  10.8.0.7   ──►  gateway 10.8.0.1
//!   assigned 172.16.4.20 ──►  gateway 172.16.4.1
//! ```
//! This is a fixed convention of the protocol, not something negotiated.
//! If the server side ever hands out other prefix sizes, this is the only
//! function that has to change.
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, Result};

/// Size of an assigned tunnel address on the wire.
pub const TUNNEL_ADDRESS_SIZE: usize = 4;

/// Last octet of the tunnel gateway inside the assigned /24.
pub const TUNNEL_GATEWAY_HOST: u8 = 1;

// ============================================
// TunnelAddress
// ============================================

/// IPv4 address granted to this client inside the tunnel.
///
/// # Example
/// ```
/// use burrow_common::types::TunnelAddress;
/// use std::net::Ipv4Addr;
///
/// let addr = TunnelAddress::from_slice(&[10, 8, 0, 7]).unwrap();
/// assert_eq!(addr.inner(), Ipv4Addr::new(10, 8, 0, 7));
/// assert_eq!(addr.gateway(), Ipv4Addr::new(10, 8, 0, 1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TunnelAddress(Ipv4Addr);

impl TunnelAddress {
    /// Wraps an address, rejecting ones that cannot be a unicast host.
    ///
    /// # Errors
    /// `UnusableAddress` for unspecified, broadcast, multicast or loopback
    /// addresses.
    pub fn new(addr: Ipv4Addr) -> Result<Self> {
        if addr.is_unspecified()
            || addr.is_broadcast()
            || addr.is_multicast()
            || addr.is_loopback()
        {
            return Err(CommonError::UnusableAddress { addr });
        }
        Ok(Self(addr))
    }

    /// Parses the 4-byte big-endian form carried in an Accept frame.
    ///
    /// # Errors
    /// `AddressLength` unless `bytes` is exactly 4 bytes long, plus the
    /// errors of [`TunnelAddress::new`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let octets: [u8; TUNNEL_ADDRESS_SIZE] = bytes
            .try_into()
            .map_err(|_| CommonError::AddressLength {
                actual: bytes.len(),
            })?;
        Self::new(Ipv4Addr::from(octets))
    }

    /// Returns the underlying `Ipv4Addr`.
    #[must_use]
    pub const fn inner(&self) -> Ipv4Addr {
        self.0
    }

    /// Returns the address as a 4-byte array.
    #[must_use]
    pub const fn octets(&self) -> [u8; 4] {
        self.0.octets()
    }

    /// Tunnel gateway for this assignment: same first three octets, last
    /// octet replaced by [`TUNNEL_GATEWAY_HOST`].
    #[must_use]
    pub const fn gateway(&self) -> Ipv4Addr {
        let [a, b, c, _] = self.0.octets();
        Ipv4Addr::new(a, b, c, TUNNEL_GATEWAY_HOST)
    }
}

impl fmt::Display for TunnelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<TunnelAddress> for Ipv4Addr {
    fn from(addr: TunnelAddress) -> Self {
        addr.0
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_replaces_last_octet() {
        let addr = TunnelAddress::new(Ipv4Addr::new(10, 8, 0, 42)).unwrap();
        assert_eq!(addr.gateway(), Ipv4Addr::new(10, 8, 0, 1));

        let addr = TunnelAddress::new(Ipv4Addr::new(192, 168, 77, 254)).unwrap();
        assert_eq!(addr.gateway(), Ipv4Addr::new(192, 168, 77, 1));
    }

    #[test]
    fn test_from_slice_length() {
        assert!(TunnelAddress::from_slice(&[10, 0, 0, 2]).is_ok());
        assert!(matches!(
            TunnelAddress::from_slice(&[10, 0, 0]),
            Err(CommonError::AddressLength { actual: 3 })
        ));
        assert!(matches!(
            TunnelAddress::from_slice(&[10, 0, 0, 2, 0]),
            Err(CommonError::AddressLength { actual: 5 })
        ));
        assert!(TunnelAddress::from_slice(&[]).is_err());
    }

    #[test]
    fn test_rejects_non_host_addresses() {
        assert_eq!(
            TunnelAddress::new(Ipv4Addr::UNSPECIFIED),
            Err(CommonError::UnusableAddress {
                addr: Ipv4Addr::UNSPECIFIED
            })
        );
        assert!(TunnelAddress::new(Ipv4Addr::BROADCAST).is_err());
        assert!(TunnelAddress::new(Ipv4Addr::LOCALHOST).is_err());
        assert!(TunnelAddress::new(Ipv4Addr::new(224, 0, 0, 1)).is_err());
    }

    #[test]
    fn test_display() {
        let addr = TunnelAddress::from_slice(&[100, 64, 0, 2]).unwrap();
        assert_eq!(addr.to_string(), "100.64.0.2");
    }
}
