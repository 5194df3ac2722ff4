//! Sealing for project secrets and environment variable values using
//! AES-256-GCM.
//!
//! Unlike a CLI tool that derives a fresh key from an operator-supplied
//! passphrase on every invocation (PBKDF2 plus a random salt), the control
//! plane holds one persistent `ENCRYPTION_KEY` for its entire lifetime: the
//! key is read once at startup by `dockyard-config` and used directly as
//! the AES-256 key, with no per-value derivation. This crate only deals in
//! already-derived key bytes; it knows nothing about where the key came
//! from.
//!
//! Sealed format: `base64(nonce || ciphertext)`, a fresh random 12-byte
//! nonce per call. The authentication tag is appended to the ciphertext by
//! `aes-gcm` itself, so tampering with either the nonce or the ciphertext
//! causes [`unseal`] to return [`CryptoError::Open`].

use aes_gcm::aead::{Aead, KeyInit, OsRng, rand_core::RngCore};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Size of the AES-256 key, in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce, in bytes.
const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag appended to the ciphertext, in bytes.
const TAG_SIZE: usize = 16;

/// Errors produced while sealing or unsealing a value.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption key must be at least {KEY_SIZE} bytes, got {0}")]
    KeyTooShort(usize),
    #[error("sealed value is not valid base64")]
    Base64(#[from] base64::DecodeError),
    #[error("sealed value is too short to contain a nonce and auth tag")]
    Truncated,
    #[error("sealed value failed to decrypt: wrong key or tampered/corrupted data")]
    Open,
}

/// A 32-byte AES-256-GCM key read once at process startup.
///
/// `Debug` is hand-rolled to never print key material, satisfying the
/// "secrets never appear in logs" invariant for any struct that embeds one.
#[derive(Clone)]
pub struct MasterKey([u8; KEY_SIZE]);

impl MasterKey {
    /// Build a master key from raw bytes. The input must be at least
    /// [`KEY_SIZE`] bytes; only the first 32 are used, so a longer
    /// caller-supplied secret (e.g. a base64-decoded token) is accepted
    /// without requiring an exact length match.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < KEY_SIZE {
            return Err(CryptoError::KeyTooShort(bytes.len()));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes[..KEY_SIZE]);
        Ok(Self(key))
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new_from_slice(&self.0).expect("key is exactly KEY_SIZE bytes")
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MasterKey").field(&"[REDACTED]").finish()
    }
}

/// Seal plaintext under `key`, returning a base64-encoded
/// `nonce || ciphertext` string safe to store as a column value.
pub fn seal(key: &MasterKey, plaintext: &[u8]) -> String {
    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = key
        .cipher()
        .encrypt(nonce, plaintext)
        .expect("AES-256-GCM encryption does not fail for in-memory buffers");

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    BASE64.encode(sealed)
}

/// Seal a UTF-8 string, a convenience wrapper over [`seal`] for the common
/// case (env var values, webhook secrets) where the plaintext is text.
pub fn seal_str(key: &MasterKey, plaintext: &str) -> String {
    seal(key, plaintext.as_bytes())
}

/// Unseal a value produced by [`seal`]. Returns [`CryptoError::Open`] if the
/// key is wrong or the value was tampered with or corrupted.
pub fn unseal(key: &MasterKey, sealed: &str) -> Result<Vec<u8>, CryptoError> {
    let data = BASE64.decode(sealed)?;
    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Truncated);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    key.cipher()
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Open)
}

/// Unseal a value produced by [`seal_str`] back into a UTF-8 string.
pub fn unseal_str(key: &MasterKey, sealed: &str) -> Result<String, CryptoError> {
    let plaintext = unseal(key, sealed)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::Open)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> MasterKey {
        MasterKey::from_bytes(&[7u8; KEY_SIZE]).unwrap()
    }

    #[test]
    fn seal_unseal_roundtrip() {
        let key = test_key();
        let sealed = seal_str(&key, "super-secret-value");
        let opened = unseal_str(&key, &sealed).expect("unseal should succeed");
        assert_eq!(opened, "super-secret-value");
    }

    #[test]
    fn seal_is_nondeterministic() {
        let key = test_key();
        let a = seal_str(&key, "same plaintext");
        let b = seal_str(&key, "same plaintext");
        assert_ne!(a, b, "fresh nonce per call must change the ciphertext");
    }

    #[test]
    fn unseal_with_wrong_key_fails() {
        let key = test_key();
        let other = MasterKey::from_bytes(&[9u8; KEY_SIZE]).unwrap();
        let sealed = seal_str(&key, "value");
        assert!(matches!(unseal_str(&other, &sealed), Err(CryptoError::Open)));
    }

    #[test]
    fn unseal_rejects_tampered_ciphertext() {
        let key = test_key();
        let sealed = seal_str(&key, "value");
        let mut raw = BASE64.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;
        let tampered = BASE64.encode(raw);
        assert!(matches!(unseal_str(&key, &tampered), Err(CryptoError::Open)));
    }

    #[test]
    fn unseal_rejects_truncated_input() {
        let key = test_key();
        assert!(matches!(unseal_str(&key, "AA=="), Err(CryptoError::Truncated)));
    }

    #[test]
    fn unseal_rejects_invalid_base64() {
        let key = test_key();
        assert!(matches!(
            unseal_str(&key, "not base64 at all!!"),
            Err(CryptoError::Base64(_))
        ));
    }

    #[test]
    fn key_too_short_is_rejected() {
        let result = MasterKey::from_bytes(&[1u8; 16]);
        assert!(matches!(result, Err(CryptoError::KeyTooShort(16))));
    }

    #[test]
    fn master_key_debug_is_redacted() {
        let key = test_key();
        let debug = format!("{key:?}");
        assert_eq!(debug, "MasterKey(\"[REDACTED]\")");
    }

    proptest::proptest! {
        #[test]
        fn seal_unseal_roundtrip_prop(plaintext in ".{0,256}") {
            let key = test_key();
            let sealed = seal_str(&key, &plaintext);
            let opened = unseal_str(&key, &sealed).unwrap();
            proptest::prop_assert_eq!(opened, plaintext);
        }
    }
}
