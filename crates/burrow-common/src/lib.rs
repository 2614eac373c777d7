// ============================================
// File: crates/burrow-common/src/lib.rs
// ============================================
//! # Burrow Common
//!
//! The tunnel address the peer grants in its Accept frame, shared by the
//! codec that parses it and the client that configures the TUN device
//! and the default route from it.
//!
//! ```
//! use burrow_common::TunnelAddress;
//!
//! let granted = TunnelAddress::from_slice(&[10, 8, 0, 7]).unwrap();
//! assert_eq!(granted.gateway().to_string(), "10.8.0.1");
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod types;

pub use error::{CommonError, Result};
pub use types::TunnelAddress;
