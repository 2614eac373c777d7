// ============================================
// File: crates/burrow-core/src/protocol/frame.rs
// ============================================
//! # Frame Definitions
//!
//! ## Creation Reason
//! Typed view of one decoded tunnel frame.
//!
//! ## Frame Layout
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Marker (4 bytes, BE)  │ 0xCAFEBABE           │
//! ├──────────────────────────────────────────────┤
//! │ Kind (1 byte)         │ 0x00 Request         │
//! │                       │ 0x01 Accept          │
//! │                       │ 0x02 Data            │
//! ├──────────────────────────────────────────────┤
//! │ Payload (variable)    │ Request: empty       │
//! │                       │ Accept: IPv4 (4)     │
//! │                       │ Data: IP packet      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial frame definitions

use std::fmt;

use bytes::Bytes;

use crate::error::{CoreError, Result};

// ============================================
// Constants
// ============================================

/// Marker every frame starts with.
pub const PROTOCOL_MARKER: u32 = 0xCAFE_BABE;

/// Marker plus kind byte.
pub const FRAME_HEADER_SIZE: usize = 5;

/// Largest datagram read from the socket in one call.
pub const MAX_DATAGRAM_SIZE: usize = 1600;

/// Payload length of a valid Accept frame.
pub const ACCEPT_PAYLOAD_SIZE: usize = 4;

// ============================================
// FrameKind
// ============================================

/// Frame kind identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Client asks the peer to open a session.
    Request = 0x00,
    /// Peer grants a session and a tunnel address.
    Accept = 0x01,
    /// Tunnelled IP packet.
    Data = 0x02,
}

impl FrameKind {
    /// Converts a byte to a frame kind.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Request),
            0x01 => Some(Self::Accept),
            0x02 => Some(Self::Data),
            _ => None,
        }
    }

    /// Returns the byte value of this kind.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FrameKind {
    type Error = CoreError;

    fn try_from(byte: u8) -> Result<Self> {
        Self::from_byte(byte).ok_or(CoreError::UnknownFrameKind(byte))
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Request => "Request",
            Self::Accept => "Accept",
            Self::Data => "Data",
        };
        f.write_str(name)
    }
}

// ============================================
// Frame
// ============================================

/// A decoded frame. The marker has already been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame kind.
    pub kind: FrameKind,
    /// Everything after the header.
    pub payload: Bytes,
}

impl Frame {
    /// Creates a frame.
    #[must_use]
    pub fn new(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Checks that the frame is of the kind the receiver is waiting for.
    ///
    /// # Errors
    /// `UnexpectedKind` on mismatch.
    pub fn expect_kind(&self, expected: FrameKind) -> Result<&Self> {
        if self.kind == expected {
            Ok(self)
        } else {
            Err(CoreError::UnexpectedKind {
                expected,
                got: self.kind,
            })
        }
    }

    /// Consumes the frame and returns its payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_kind_bytes() {
        assert_eq!(FrameKind::Request.as_byte(), 0x00);
        assert_eq!(FrameKind::Accept.as_byte(), 0x01);
        assert_eq!(FrameKind::Data.as_byte(), 0x02);

        assert_eq!(FrameKind::from_byte(0x02), Some(FrameKind::Data));
        assert_eq!(FrameKind::from_byte(0x03), None);
        assert!(matches!(
            FrameKind::try_from(0xFF),
            Err(CoreError::UnknownFrameKind(0xFF))
        ));
    }

    #[test]
    fn test_expect_kind() {
        let frame = Frame::new(FrameKind::Accept, vec![10, 0, 0, 2]);
        assert!(frame.expect_kind(FrameKind::Accept).is_ok());

        let err = frame.expect_kind(FrameKind::Data).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnexpectedKind {
                expected: FrameKind::Data,
                got: FrameKind::Accept
            }
        ));
    }

    #[test]
    fn test_datagram_fits_header() {
        assert!(MAX_DATAGRAM_SIZE > FRAME_HEADER_SIZE + ACCEPT_PAYLOAD_SIZE);
    }
}
