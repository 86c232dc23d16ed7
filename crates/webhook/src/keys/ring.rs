//! [`KeyRing`]: the immutable set of sealing recipients.

use std::fmt::{self, Write as _};

use crypto_box::PublicKey;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::crypto::wrap::PUBLIC_KEY_LEN;

/// Number of SHA-256 bytes kept in a [`KeyId`].
const KEY_ID_LEN: usize = 8;

/// Errors produced while assembling a key ring.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Decoded key material has the wrong length.
    #[error("recipient key has invalid length: expected {PUBLIC_KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),

    /// Key file contents are not valid base64.
    #[error("recipient key is not valid base64")]
    InvalidEncoding,
}

/// Short, stable fingerprint of a recipient public key.
///
/// Lowercase hex of the first 8 bytes of SHA-256 over the raw key. An
/// unsealer uses it to pick which wrapped data key it can open.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(String);

impl KeyId {
    /// Fingerprint `public`.
    pub fn of(public: &PublicKey) -> Self {
        let digest = Sha256::digest(public.as_bytes());
        let mut hex = String::with_capacity(KEY_ID_LEN * 2);
        for b in &digest[..KEY_ID_LEN] {
            // Writing into a String cannot fail.
            let _ = write!(hex, "{b:02x}");
        }
        Self(hex)
    }

    /// Accept a key id read back from a sealed token.
    pub fn from_hex(s: &str) -> Option<Self> {
        let valid = s.len() == KEY_ID_LEN * 2
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One public key the data key is wrapped to.
#[derive(Clone)]
pub struct Recipient {
    pub key_id: KeyId,
    pub public: PublicKey,
}

impl Recipient {
    /// Build a recipient from raw X25519 public key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidLength`] unless `bytes` is exactly
    /// [`PUBLIC_KEY_LEN`] long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let raw: [u8; PUBLIC_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidLength(bytes.len()))?;
        Ok(Self::from(PublicKey::from(raw)))
    }
}

impl From<PublicKey> for Recipient {
    fn from(public: PublicKey) -> Self {
        Self {
            key_id: KeyId::of(&public),
            public,
        }
    }
}

impl fmt::Debug for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipient")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Process-wide sealing key material.
///
/// Built once at startup and shared read-only (behind an `Arc`) by every
/// request handler; there is no mutation path after construction, so no lock
/// is needed. The first recipient is the primary key; any others are rotation
/// recipients that every data key is additionally wrapped to.
#[derive(Debug, Clone, Default)]
pub struct KeyRing {
    recipients: Vec<Recipient>,
}

impl KeyRing {
    /// Build a key ring from `primary` followed by `rotation` recipients.
    ///
    /// Recipients whose key id repeats an earlier one are dropped.
    pub fn new(primary: Recipient, rotation: impl IntoIterator<Item = Recipient>) -> Self {
        let mut recipients = vec![primary];
        for r in rotation {
            if !recipients.iter().any(|known| known.key_id == r.key_id) {
                recipients.push(r);
            }
        }
        Self { recipients }
    }

    /// A key ring with no recipients. Sealing against it always fails.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn len(&self) -> usize {
        self.recipients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm_siv::aead::OsRng;
    use crypto_box::SecretKey;

    fn recipient() -> Recipient {
        Recipient::from(SecretKey::generate(&mut OsRng).public_key())
    }

    #[test]
    fn key_id_is_sixteen_hex_chars() {
        let id = recipient().key_id;
        assert_eq!(id.as_str().len(), 16);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn key_id_matches_sha256_prefix() {
        let id = KeyId::of(&PublicKey::from([9u8; 32]));
        assert_eq!(id.as_str(), "8c0cc17a04942cc4");
    }

    #[test]
    fn key_id_is_stable() {
        let r = recipient();
        assert_eq!(KeyId::of(&r.public), r.key_id);
    }

    #[test]
    fn from_hex_accepts_only_canonical_ids() {
        let id = recipient().key_id;
        assert_eq!(KeyId::from_hex(id.as_str()), Some(id.clone()));
        assert!(KeyId::from_hex(&id.as_str().to_uppercase()).is_none());
        assert!(KeyId::from_hex("abc").is_none());
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        assert!(matches!(
            Recipient::from_bytes(&[0u8; 31]),
            Err(KeyError::InvalidLength(31))
        ));
    }

    #[test]
    fn duplicate_rotation_keys_are_dropped() {
        let primary = recipient();
        let rotation = recipient();
        let ring = KeyRing::new(
            primary.clone(),
            vec![rotation.clone(), primary.clone(), rotation],
        );
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.recipients()[0].key_id, primary.key_id);
    }

    #[test]
    fn empty_ring_has_no_recipients() {
        assert!(KeyRing::empty().is_empty());
    }

    #[test]
    fn debug_does_not_print_key_bytes() {
        let r = recipient();
        let out = format!("{r:?}");
        assert!(out.contains(r.key_id.as_str()));
        assert!(!out.contains("public"));
    }
}
