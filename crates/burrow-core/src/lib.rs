// ============================================
// File: crates/burrow-core/src/lib.rs
// ============================================
//! # Burrow Core
//!
//! ## Creation Reason
//! Pure, I/O-free definition of what a Burrow datagram is: a five-byte
//! frame header plus payload, sealed under the session's pre-shared key.
//! The client crate moves bytes; this crate decides what they mean.
//!
//! ## Datagram Pipeline
//! ```text
//! outbound   payload ─► encode(kind) ─► FrameCipher::seal ─► socket
//! inbound    socket ─► FrameCipher::open ─► decode ─► expect_kind ─► payload
//! ```
//! A received datagram is never parsed before `open` succeeds, so a
//! forged plaintext frame is a crypto error, not a protocol one.
//!
//! ## Modules
//! - [`protocol`]: frame kinds, header layout, Accept payload
//! - [`crypto`]: `PresharedKey`, key derivation, `FrameCipher`
//! - [`error`]: `CoreError` with format/protocol/crypto classes
//!
//! ## ⚠️ Important Note for Next Developer
//! - Changing the header layout means changing `PROTOCOL_MARKER` too;
//!   old peers must reject new frames outright
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod protocol;

pub use crypto::{FrameCipher, PresharedKey, SEAL_OVERHEAD};
pub use error::{CoreError, Result};
pub use protocol::{
    decode, encode, parse_accept, Frame, FrameKind, FRAME_HEADER_SIZE, MAX_DATAGRAM_SIZE,
    PROTOCOL_MARKER,
};
