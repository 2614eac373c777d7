// ============================================
// File: crates/burrow-core/src/crypto/cipher.rs
// ============================================
//! # Frame Encryption
//!
//! ## Creation Reason
//! Seals whole frames into opaque datagrams and opens them again,
//! using ChaCha20-Poly1305 under the pre-shared key.
//!
//! ## Datagram Format
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │ Nonce (12 bytes)               │ ← random per datagram │
//! ├────────────────────────────────────────────────────┤
//! │ Encrypted frame (variable)     │ ← ChaCha20 ciphertext │
//! │ └─ Poly1305 Tag (16 bytes)     │ ← Authentication tag  │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never reuse a (key, nonce) pair. The key lives for the whole session
//!   and both directions share it, so nonces come from `OsRng`.
//! - `open` reports every failure as `Decryption`, including datagrams
//!   shorter than the overhead
//!
//! ## Last Modified
//! v0.1.0 - Initial frame cipher

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Nonce,
};

use super::{PresharedKey, NONCE_LEN, SEAL_OVERHEAD};
use crate::error::{CoreError, Result};

// ============================================
// FrameCipher
// ============================================

/// Seals and opens datagrams with a fixed pre-shared key.
///
/// Shared read-only between the relay loops (`Arc<FrameCipher>`).
pub struct FrameCipher {
    aead: ChaCha20Poly1305,
}

impl FrameCipher {
    /// Creates a cipher for `key`.
    #[must_use]
    pub fn new(key: &PresharedKey) -> Self {
        Self {
            aead: ChaCha20Poly1305::new(key.as_bytes().into()),
        }
    }

    /// Encrypts `plaintext` and returns `nonce || ciphertext || tag`.
    ///
    /// # Errors
    /// `Encryption` if the AEAD rejects the input.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Bytes> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .aead
            .encrypt(&nonce, plaintext)
            .map_err(|_| CoreError::Encryption {
                context: "ChaCha20-Poly1305 encryption failed".into(),
            })?;

        let mut out = BytesMut::with_capacity(NONCE_LEN + ciphertext.len());
        out.put_slice(&nonce);
        out.put_slice(&ciphertext);
        Ok(out.freeze())
    }

    /// Authenticates and decrypts a datagram produced by [`seal`](Self::seal).
    ///
    /// # Errors
    /// `Decryption` on a short datagram, a wrong key or any tampering.
    pub fn open(&self, datagram: &[u8]) -> Result<Vec<u8>> {
        if datagram.len() < SEAL_OVERHEAD {
            return Err(CoreError::Decryption);
        }

        let (nonce, ciphertext) = datagram.split_at(NONCE_LEN);
        self.aead
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CoreError::Decryption)
    }

    /// Returns the bytes `seal` adds to a plaintext.
    #[must_use]
    pub const fn overhead(&self) -> usize {
        SEAL_OVERHEAD
    }
}

impl fmt::Debug for FrameCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCipher")
            .field("algorithm", &"ChaCha20-Poly1305")
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
