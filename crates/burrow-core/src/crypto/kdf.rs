// ============================================
// File: crates/burrow-core/src/crypto/kdf.rs
// ============================================
//! # Passphrase Keys
//!
//! Lets an operator type the same phrase on both ends instead of copying
//! a base64 key around. HKDF is not a password hash: a passphrase key is
//! only as strong as the phrase.
//!
//! ## Last Modified
//! v0.1.0 - Initial KDF implementation

use hkdf::Hkdf;
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroize;

use super::{PresharedKey, KEY_LEN};
use crate::error::{CoreError, Result};

const PASSPHRASE_SALT: &[u8] = b"burrow-v1";
const PASSPHRASE_INFO: &[u8] = b"burrow-preshared-key";

/// `HKDF-SHA256(salt = "burrow-v1", ikm = passphrase, info = "burrow-preshared-key")`
/// truncated to one key.
///
/// # Errors
/// `InvalidKey` for an empty passphrase.
pub fn derive_from_passphrase(passphrase: &str) -> Result<PresharedKey> {
    if passphrase.is_empty() {
        return Err(CoreError::invalid_key("passphrase is empty"));
    }

    let mut okm = [0u8; KEY_LEN];
    Hkdf::<Sha256>::new(Some(PASSPHRASE_SALT), passphrase.as_bytes())
        .expand(PASSPHRASE_INFO, &mut okm)
        .map_err(|e| CoreError::KeyDerivation {
            reason: e.to_string(),
        })?;

    let key = PresharedKey::from_bytes(okm);
    okm.zeroize();
    debug!("pre-shared key derived from passphrase");
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_phrase_same_key() {
        let a = derive_from_passphrase("correct horse battery staple").unwrap();
        let b = derive_from_passphrase("correct horse battery staple").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_phrase_is_not_normalised() {
        let plain = derive_from_passphrase("alpha").unwrap();
        assert_ne!(plain, derive_from_passphrase("alpha ").unwrap());
        assert_ne!(plain, derive_from_passphrase("Alpha").unwrap());
    }

    #[test]
    fn test_key_is_not_the_phrase() {
        let phrase = "0123456789abcdef0123456789abcdef";
        let key = derive_from_passphrase(phrase).unwrap();
        assert_ne!(key.as_bytes().as_slice(), phrase.as_bytes());
    }

    #[test]
    fn test_empty_phrase_rejected() {
        let err = derive_from_passphrase("").unwrap_err();
        assert!(matches!(err, CoreError::InvalidKey { .. }));
    }
}
