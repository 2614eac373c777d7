// ============================================
// File: crates/burrow-core/src/protocol/mod.rs
// ============================================
//! # Frames
//!
//! One frame per datagram, always sealed:
//!
//! ```text
//!  0         4      5
//! ┌─────────┬──────┬──────────────────────────────┐
//! │ marker  │ kind │ payload (to end of datagram) │
//! │ u32 BE  │  u8  │                              │
//! └─────────┴──────┴──────────────────────────────┘
//!
//! Request  client → peer   empty
//! Accept   peer → client   granted IPv4 address, 4 bytes
//! Data     both ways       one raw IP packet
//! ```
//!
//! [`frame`] holds the types and constants, [`codec`] the byte-level
//! encode/decode and Accept parsing.

pub mod codec;
pub mod frame;

pub use codec::{decode, encode, parse_accept};
pub use frame::{
    Frame, FrameKind, ACCEPT_PAYLOAD_SIZE, FRAME_HEADER_SIZE, MAX_DATAGRAM_SIZE,
    PROTOCOL_MARKER,
};
