// ============================================
// File: crates/burrow-core/src/crypto/mod.rs
// ============================================
//! # Datagram Sealing
//!
//! One static key, configured on both ends out of band, protects every
//! datagram for the life of the process. There is no negotiation and no
//! rekeying.
//!
//! ```text
//! datagram = nonce[12] ‖ ChaCha20(frame) ‖ Poly1305 tag[16]
//! ```
//!
//! - [`keys`]: `PresharedKey` from bytes, base64 or a passphrase
//! - [`kdf`]: the passphrase derivation
//! - [`cipher`]: `FrameCipher`
//!
//! ## ⚠️ Important Note for Next Developer
//! - The nonce is drawn from `OsRng` for each datagram. Both directions
//!   share the key, so a per-direction counter would collide.
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod cipher;
pub mod kdf;
pub mod keys;

pub use cipher::FrameCipher;
pub use keys::PresharedKey;

/// ChaCha20-Poly1305 key length.
pub const KEY_LEN: usize = 32;

/// ChaCha20-Poly1305 nonce length.
pub const NONCE_LEN: usize = 12;

/// Poly1305 tag length.
pub const TAG_LEN: usize = 16;

/// Bytes a sealed datagram adds to its frame.
pub const SEAL_OVERHEAD: usize = NONCE_LEN + TAG_LEN;
