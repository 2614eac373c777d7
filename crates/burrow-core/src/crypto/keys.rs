// ============================================
// File: crates/burrow-core/src/crypto/keys.rs
// ============================================
//! # Pre-Shared Key
//!
//! ## Creation Reason
//! The tunnel has one secret, agreed on out of band. This is its only
//! in-memory form; it accepts three spellings of that secret.
//!
//! ```text
//! --key <base64>        from_base64
//! --key-file <path>     from_base64 (file contents, trimmed)
//! --passphrase <text>   from_passphrase (HKDF-SHA256)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Bytes are wiped on drop, and `Debug` prints nothing secret
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::KEY_LEN;
use crate::error::{CoreError, Result};

/// The ChaCha20-Poly1305 key shared with the peer.
///
/// ```
/// use burrow_core::crypto::PresharedKey;
///
/// let key = PresharedKey::generate();
/// assert_eq!(PresharedKey::from_base64(&key.to_base64()).unwrap(), key);
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PresharedKey([u8; KEY_LEN]);

impl PresharedKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses standard base64, ignoring leading and trailing whitespace.
    ///
    /// # Errors
    /// `InvalidKey` unless the text decodes to exactly [`KEY_LEN`] bytes.
    pub fn from_base64(text: &str) -> Result<Self> {
        let decoded = Zeroizing::new(
            BASE64
                .decode(text.trim())
                .map_err(|_| CoreError::invalid_key("not valid base64"))?,
        );

        let bytes: [u8; KEY_LEN] = decoded.as_slice().try_into().map_err(|_| {
            CoreError::invalid_key(format!("expected {KEY_LEN} bytes, got {}", decoded.len()))
        })?;
        Ok(Self(bytes))
    }

    /// # Errors
    /// `InvalidKey` for an empty passphrase.
    pub fn from_passphrase(passphrase: &str) -> Result<Self> {
        super::kdf::derive_from_passphrase(passphrase)
    }

    /// A fresh key from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = Self([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut key.0);
        key
    }

    /// Standard base64, the format `genkey` prints and `key` expects.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Raw key bytes, for building the cipher only.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for PresharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PresharedKey(..)")
    }
}

// Constant-time equality
impl PartialEq for PresharedKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice().ct_eq(other.0.as_slice()).into()
    }
}

impl Eq for PresharedKey {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(PresharedKey::generate(), PresharedKey::generate());
    }

    #[test]
    fn test_base64_tolerates_key_file_whitespace() {
        let key = PresharedKey::from_bytes([0x42; KEY_LEN]);
        let file_contents = format!("  {}\n", key.to_base64());
        assert_eq!(PresharedKey::from_base64(&file_contents).unwrap(), key);
    }

    #[test]
    fn test_base64_rejects_bad_input() {
        assert!(matches!(
            PresharedKey::from_base64("not base64!!"),
            Err(CoreError::InvalidKey { .. })
        ));

        let err = PresharedKey::from_base64(&BASE64.encode([0u8; 16])).unwrap_err();
        assert_eq!(err.to_string(), "Unusable pre-shared key: expected 32 bytes, got 16");
        assert!(err.is_crypto_error());
    }

    #[test]
    fn test_equality_covers_every_byte() {
        let key = PresharedKey::from_bytes([0x11; KEY_LEN]);
        assert_eq!(key, PresharedKey::from_bytes([0x11; KEY_LEN]));

        for index in [0, KEY_LEN / 2, KEY_LEN - 1] {
            let mut bytes = [0x11; KEY_LEN];
            bytes[index] ^= 0x01;
            assert_ne!(key, PresharedKey::from_bytes(bytes));
        }
    }

    #[test]
    fn test_debug_hides_key() {
        let key = PresharedKey::from_bytes([0xAB; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "PresharedKey(..)");
    }
}
