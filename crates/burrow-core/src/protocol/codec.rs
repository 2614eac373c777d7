// ============================================
// File: crates/burrow-core/src/protocol/codec.rs
// ============================================
//! # Frame Codec
//!
//! ## Creation Reason
//! Serializes frames to the fixed-header wire form and parses them back.
//!
//! ## Parsing Strategy
//! 1. Check the buffer holds at least the 5-byte header
//! 2. Check the marker
//! 3. Map the kind byte
//! 4. Hand the rest over as payload, untouched
//!
//! ## ⚠️ Important Note for Next Developer
//! - `decode` must only ever be called on plaintext that `FrameCipher::open`
//!   has authenticated. Length checks on ciphertext are meaningless.
//! - Kind checking against session state is the caller's job
//!   (`Frame::expect_kind`), not the codec's
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use bytes::{Buf, BufMut, Bytes, BytesMut};

use burrow_common::types::TunnelAddress;

use crate::error::{CoreError, Result};
use crate::protocol::frame::{Frame, FrameKind, FRAME_HEADER_SIZE, PROTOCOL_MARKER};

// ============================================
// Encode
// ============================================

/// Builds the wire form of a frame: marker, kind, payload verbatim.
#[must_use]
pub fn encode(kind: FrameKind, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + payload.len());
    buf.put_u32(PROTOCOL_MARKER);
    buf.put_u8(kind.as_byte());
    buf.put_slice(payload);
    buf.freeze()
}

// ============================================
// Decode
// ============================================

/// Parses a plaintext frame.
///
/// # Errors
/// - `MessageTooShort` if fewer than 5 bytes
/// - `BadMarker` if the first 4 bytes are not the protocol marker
/// - `UnknownFrameKind` if the kind byte is not recognised
pub fn decode(bytes: &[u8]) -> Result<Frame> {
    if bytes.len() < FRAME_HEADER_SIZE {
        return Err(CoreError::too_short(FRAME_HEADER_SIZE, bytes.len()));
    }

    let mut buf = bytes;
    let marker = buf.get_u32();
    if marker != PROTOCOL_MARKER {
        return Err(CoreError::BadMarker { got: marker });
    }

    let kind = FrameKind::try_from(buf.get_u8())?;

    Ok(Frame {
        kind,
        payload: Bytes::copy_from_slice(buf),
    })
}

/// Extracts the granted tunnel address from an Accept frame.
///
/// # Errors
/// - `UnexpectedKind` if the frame is not an Accept
/// - `InvalidAssignment` if the payload is not exactly
///   `ACCEPT_PAYLOAD_SIZE` bytes or is not a usable host address
pub fn parse_accept(frame: &Frame) -> Result<TunnelAddress> {
    frame.expect_kind(FrameKind::Accept)?;
    Ok(TunnelAddress::from_slice(&frame.payload)?)
}

// ============================================
// Tests
// ============================================
