// ============================================
// File: crates/burrow-common/src/error.rs
// ============================================
//! # Address Errors
//!
//! ## Creation Reason
//! The only thing this crate validates is the address the peer grants,
//! so its error type names exactly those two failures.
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::types::TUNNEL_ADDRESS_SIZE;

/// Result type for address validation.
pub type Result<T> = std::result::Result<T, CommonError>;

/// Why a granted tunnel address was refused.
///
/// ```
/// use burrow_common::{CommonError, TunnelAddress};
///
/// let err = TunnelAddress::from_slice(&[10, 8, 0]).unwrap_err();
/// assert!(matches!(err, CommonError::AddressLength { actual: 3 }));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// The Accept payload is not exactly one IPv4 address.
    #[error("tunnel address must be {TUNNEL_ADDRESS_SIZE} bytes, got {actual}")]
    AddressLength { actual: usize },

    /// The address cannot be bound to an interface.
    #[error("{addr} cannot be a tunnel address")]
    UnusableAddress { addr: Ipv4Addr },
}
