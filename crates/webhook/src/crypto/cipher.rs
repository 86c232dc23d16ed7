//! AES-256-GCM-SIV encryption and decryption of individual secret fields.
//!
//! **Algorithm choice:** AES-256-GCM-SIV (RFC 8452) is nonce-misuse-resistant.
//! Every field still gets a fresh random 96-bit nonce; SIV only limits the
//! damage if the random source ever repeats.
//!
//! Every call binds caller-supplied associated data, so a ciphertext moved to
//! another secret or field fails authentication.

use aes_gcm_siv::{
    aead::{rand_core::CryptoRngCore, Aead, KeyInit, Payload},
    Aes256GcmSiv, Nonce,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use thiserror::Error;

/// Byte length of an AES-256 key (32 bytes = 256 bits).
pub const KEY_LEN: usize = 32;

/// Byte length of an AES-GCM-SIV nonce (12 bytes = 96 bits).
pub const NONCE_LEN: usize = 12;

/// Byte length of the authentication tag appended to every ciphertext.
pub const TAG_LEN: usize = 16;

/// One encrypted field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    /// Raw nonce bytes.
    pub nonce: [u8; NONCE_LEN],
    /// Raw ciphertext + authentication tag bytes.
    pub ciphertext: Vec<u8>,
}

impl EncryptedField {
    /// `<base64url(nonce)>.<base64url(ciphertext+tag)>`
    pub fn to_segments(&self) -> String {
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(self.nonce),
            URL_SAFE_NO_PAD.encode(&self.ciphertext),
        )
    }

    /// Parse the two segments produced by [`EncryptedField::to_segments`].
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidFormat`] on bad base64, a wrong nonce
    /// length, or a ciphertext shorter than the tag.
    pub fn from_segments(nonce: &str, ciphertext: &str) -> Result<Self, CipherError> {
        let nonce_bytes = URL_SAFE_NO_PAD
            .decode(nonce)
            .map_err(|_| CipherError::InvalidFormat)?;
        let nonce: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| CipherError::InvalidFormat)?;

        let ciphertext = URL_SAFE_NO_PAD
            .decode(ciphertext)
            .map_err(|_| CipherError::InvalidFormat)?;
        if ciphertext.len() < TAG_LEN {
            return Err(CipherError::InvalidFormat);
        }

        Ok(Self { nonce, ciphertext })
    }
}

/// Errors produced by the cipher layer.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The data key is the wrong length (must be [`KEY_LEN`] bytes).
    #[error("invalid data key length: expected {KEY_LEN} bytes")]
    InvalidKeyLength,

    /// The random source could not produce a nonce.
    #[error("random source failure")]
    RandomSource,

    /// AES-GCM-SIV encryption or decryption failed.
    #[error("aead operation failed")]
    AeadFailure,

    /// The encoded field does not match the expected format.
    #[error("invalid encrypted field format")]
    InvalidFormat,
}

/// Encrypt `plaintext` under `key`, binding `aad`.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes,
/// [`CipherError::RandomSource`] if no nonce could be drawn, and
/// [`CipherError::AeadFailure`] on an internal AEAD error.
pub fn encrypt_field(
    plaintext: &[u8],
    aad: &[u8],
    key: &[u8],
    rng: &mut impl CryptoRngCore,
) -> Result<EncryptedField, CipherError> {
    let cipher = build_cipher(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.try_fill_bytes(&mut nonce_bytes)
        .map_err(|_| CipherError::RandomSource)?;

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CipherError::AeadFailure)?;

    Ok(EncryptedField {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypt an [`EncryptedField`] back to plaintext bytes.
///
/// # Errors
///
/// Returns [`CipherError::InvalidKeyLength`] if `key` is not [`KEY_LEN`] bytes.
/// Returns [`CipherError::AeadFailure`] if authentication fails (wrong key,
/// wrong associated data, or tampered data).
pub fn decrypt_field(field: &EncryptedField, aad: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = build_cipher(key)?;
    cipher
        .decrypt(
            Nonce::from_slice(&field.nonce),
            Payload {
                msg: field.ciphertext.as_ref(),
                aad,
            },
        )
        .map_err(|_| CipherError::AeadFailure)
}

fn build_cipher(key: &[u8]) -> Result<Aes256GcmSiv, CipherError> {
    if key.len() != KEY_LEN {
        return Err(CipherError::InvalidKeyLength);
    }
    Aes256GcmSiv::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm_siv::aead::{rand_core::RngCore, OsRng};

    fn random_key() -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let key = random_key();
        let encrypted = encrypt_field(b"hunter2", b"ns/db/password", &key, &mut OsRng).unwrap();
        let decrypted = decrypt_field(&encrypted, b"ns/db/password", &key).unwrap();
        assert_eq!(decrypted, b"hunter2");
    }

    #[test]
    fn empty_plaintext_round_trips() {
        let key = random_key();
        let encrypted = encrypt_field(b"", b"ns/db/empty", &key, &mut OsRng).unwrap();
        assert_eq!(encrypted.ciphertext.len(), TAG_LEN);
        assert!(decrypt_field(&encrypted, b"ns/db/empty", &key).unwrap().is_empty());
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let encrypted = encrypt_field(b"secret", b"a", &random_key(), &mut OsRng).unwrap();
        assert!(decrypt_field(&encrypted, b"a", &random_key()).is_err());
    }

    #[test]
    fn wrong_aad_fails_decryption() {
        let key = random_key();
        let encrypted = encrypt_field(b"secret", b"ns/db/password", &key, &mut OsRng).unwrap();
        assert!(matches!(
            decrypt_field(&encrypted, b"ns/db/username", &key),
            Err(CipherError::AeadFailure)
        ));
    }

    #[test]
    fn nonces_differ_per_call() {
        let key = random_key();
        let a = encrypt_field(b"same", b"x", &key, &mut OsRng).unwrap();
        let b = encrypt_field(b"same", b"x", &key, &mut OsRng).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn invalid_key_length_rejected() {
        let short_key = vec![0u8; 16];
        assert!(matches!(
            encrypt_field(b"x", b"", &short_key, &mut OsRng),
            Err(CipherError::InvalidKeyLength)
        ));
    }

    #[test]
    fn segments_round_trip() {
        let field = encrypt_field(b"hello", b"", &random_key(), &mut OsRng).unwrap();
        let s = field.to_segments();
        let (nonce, ct) = s.split_once('.').unwrap();
        assert_eq!(EncryptedField::from_segments(nonce, ct).unwrap(), field);
    }

    #[test]
    fn from_segments_rejects_bad_base64() {
        assert!(EncryptedField::from_segments("!!!", "abc").is_err());
    }

    #[test]
    fn from_segments_rejects_short_nonce() {
        let nonce = URL_SAFE_NO_PAD.encode([0u8; 4]);
        let ct = URL_SAFE_NO_PAD.encode([0u8; TAG_LEN]);
        assert!(EncryptedField::from_segments(&nonce, &ct).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_auth() {
        let key = random_key();
        let mut field = encrypt_field(b"tamper me", b"ctx", &key, &mut OsRng).unwrap();
        field.ciphertext[0] ^= 0x01;
        assert!(decrypt_field(&field, b"ctx", &key).is_err());
    }

    #[test]
    fn tampered_nonce_fails_auth() {
        let key = random_key();
        let mut field = encrypt_field(b"tamper me", b"ctx", &key, &mut OsRng).unwrap();
        field.nonce[NONCE_LEN - 1] ^= 0x80;
        assert!(decrypt_field(&field, b"ctx", &key).is_err());
    }
}
