// ============================================
// File: crates/burrow-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Everything that can go wrong between a sealed datagram and a typed
//! `Frame`, in both directions.
//!
//! ## Error Classes
//! ```text
//! format    not a frame: too short, wrong marker, unknown kind byte
//! protocol  a frame, but not the one expected; unusable Accept payload
//! crypto    seal/open failed, key unusable or not derivable
//! ```
//! Every format error is also a protocol error.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Decryption` carries no detail on purpose: a wrong key, a forged
//!   datagram and a flipped bit must be indistinguishable
//! - Key bytes never go into a message
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use burrow_common::error::CommonError;

use crate::protocol::FrameKind;

/// Result type for framing and crypto operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Framing and crypto errors.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Crypto
    // ========================================

    /// The AEAD refused to seal a frame.
    #[error("Sealing {context} failed")]
    Encryption {
        /// What was being sealed
        context: String,
    },

    /// A datagram did not authenticate under the session key.
    #[error("Datagram failed authentication")]
    Decryption,

    /// The configured key cannot be used.
    #[error("Unusable pre-shared key: {reason}")]
    InvalidKey {
        /// What is wrong with it (never the key itself)
        reason: String,
    },

    /// HKDF could not produce a key.
    #[error("Cannot derive key: {reason}")]
    KeyDerivation {
        /// HKDF error text
        reason: String,
    },

    // ========================================
    // Format
    // ========================================

    /// Fewer bytes than a frame header.
    #[error("Frame of {actual} bytes is shorter than the {expected}-byte header")]
    MessageTooShort {
        /// Minimum length
        expected: usize,
        /// Received length
        actual: usize,
    },

    /// The first four bytes are not the protocol marker.
    #[error("Frame marker 0x{got:08x} is not 0xcafebabe")]
    BadMarker {
        /// Marker found on the wire
        got: u32,
    },

    /// The kind byte names no known frame.
    #[error("Unknown frame kind 0x{0:02x}")]
    UnknownFrameKind(u8),

    // ========================================
    // Protocol
    // ========================================

    /// A valid frame of the wrong kind for the current phase.
    #[error("Expected {expected} frame, got {got}")]
    UnexpectedKind {
        /// Kind the receiver was waiting for
        expected: FrameKind,
        /// Kind that arrived
        got: FrameKind,
    },

    /// The Accept payload is not a usable tunnel address.
    #[error("Bad Accept payload: {0}")]
    InvalidAssignment(#[from] CommonError),
}

impl CoreError {
    /// Creates a `MessageTooShort` error.
    #[must_use]
    pub const fn too_short(expected: usize, actual: usize) -> Self {
        Self::MessageTooShort { expected, actual }
    }

    /// Creates an `InvalidKey` error.
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }

    /// The bytes are not a frame at all.
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::MessageTooShort { .. } | Self::BadMarker { .. } | Self::UnknownFrameKind(_)
        )
    }

    /// The bytes are a frame-level violation: format errors, wrong kind,
    /// unusable Accept.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        self.is_format_error()
            || matches!(self, Self::UnexpectedKind { .. } | Self::InvalidAssignment(_))
    }

    /// Sealing, opening or key handling failed.
    #[must_use]
    pub const fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::Encryption { .. }
                | Self::Decryption
                | Self::InvalidKey { .. }
                | Self::KeyDerivation { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            CoreError::too_short(5, 3).to_string(),
            "Frame of 3 bytes is shorter than the 5-byte header"
        );
        assert_eq!(
            CoreError::BadMarker { got: 0xDEAD_BEEF }.to_string(),
            "Frame marker 0xdeadbeef is not 0xcafebabe"
        );
        assert_eq!(
            CoreError::UnexpectedKind {
                expected: FrameKind::Accept,
                got: FrameKind::Data,
            }
            .to_string(),
            "Expected Accept frame, got Data"
        );
    }

    #[test]
    fn test_error_classes() {
        let short = CoreError::too_short(5, 0);
        assert!(short.is_format_error());
        assert!(short.is_protocol_error());
        assert!(!short.is_crypto_error());

        let wrong_kind = CoreError::UnexpectedKind {
            expected: FrameKind::Data,
            got: FrameKind::Request,
        };
        assert!(wrong_kind.is_protocol_error());
        assert!(!wrong_kind.is_format_error());

        assert!(CoreError::Decryption.is_crypto_error());
        assert!(!CoreError::Decryption.is_protocol_error());
    }

    #[test]
    fn test_bad_address_is_protocol_error() {
        let err: CoreError = CommonError::AddressLength { actual: 2 }.into();
        assert!(matches!(err, CoreError::InvalidAssignment(_)));
        assert!(err.is_protocol_error());
        assert_eq!(err.to_string(), "Bad Accept payload: tunnel address must be 4 bytes, got 2");
    }
}
