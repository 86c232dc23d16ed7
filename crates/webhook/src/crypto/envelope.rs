//! Envelope sealing of a Secret's field map.
//!
//! Per request:
//!
//! 1. A fresh [`DataKey`] is drawn from the CSPRNG.
//! 2. Every field value is encrypted under it with [`encrypt_field`], bound to
//!    `namespace/name/field-key`.
//! 3. The data key is wrapped once per recipient in the [`KeyRing`].
//!
//! # Token format
//!
//! Each sealed field is serialised as a self-contained token:
//!
//! ```text
//! v1.<kid>:<b64url(wrapped)>[,<kid>:<b64url(wrapped)>...].<b64url(nonce)>.<b64url(ciphertext+tag)>
//! ```
//!
//! Any one listed recipient's secret key is enough to open any field.
//!
//! # Security invariants
//!
//! - Sealing is all-or-nothing: no partially sealed payload is ever returned.
//! - Errors name field keys at most, never field values.
//! - The data key, and any unwrapped copy of it, is zeroized when dropped
//!   and never printed.

use std::collections::BTreeMap;
use std::fmt;

use aes_gcm_siv::aead::rand_core::CryptoRngCore;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use crypto_box::SecretKey;
use thiserror::Error;
use zeroize::Zeroizing;

use super::cipher::{decrypt_field, encrypt_field, CipherError, EncryptedField, KEY_LEN};
use super::wrap::{unwrap_key, wrap_key};
use crate::keys::{KeyId, KeyRing};

/// Identifier of the cipher suite, recorded on every sealed Secret.
pub const ALGORITHM: &str = "x25519-sealedbox+aes-256-gcm-siv/v1";

/// Prefix of every field token.
pub const TOKEN_VERSION: &str = "v1";

/// Errors that abort sealing. Every variant results in a denied admission.
#[derive(Debug, Error)]
pub enum SealError {
    /// No recipient key is loaded, so nothing could ever be unsealed.
    #[error("no sealing key material available")]
    KeyMaterialUnavailable,

    /// The CSPRNG could not produce a data key or nonce.
    #[error("random source failure")]
    RandomSourceFailure,

    /// AEAD encryption of one field failed.
    #[error("failed to encrypt field {field:?}")]
    Encryption { field: String },

    /// Wrapping the data key to one recipient failed.
    #[error("failed to wrap data key for recipient {key_id}")]
    KeyWrap { key_id: KeyId },
}

/// Errors from [`open_field`] and [`open_data_key`].
#[derive(Debug, Error)]
pub enum OpenError {
    /// The token is not a `v1` sealed field.
    #[error("invalid sealed field token")]
    InvalidToken,

    /// None of the wrapped keys was addressed to the given secret key.
    #[error("no wrapped key for recipient {0}")]
    NoMatchingRecipient(KeyId),

    /// The wrapped key or ciphertext failed authentication.
    #[error("authentication failed")]
    Authentication,
}

/// Which Secret the sealed fields belong to.
///
/// Bound into every field's associated data so a ciphertext cannot be moved
/// to another namespace, name, or field without detection.
#[derive(Debug, Clone, Copy)]
pub struct SealContext<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
}

impl SealContext<'_> {
    fn aad(&self, field: &str) -> Vec<u8> {
        format!("{}/{}/{}", self.namespace, self.name, field).into_bytes()
    }
}

/// Symmetric per-request data key.
///
/// Held in a [`Zeroizing`] buffer, so it is wiped when dropped.
pub struct DataKey(Zeroizing<[u8; KEY_LEN]>);

impl DataKey {
    fn generate(rng: &mut impl CryptoRngCore) -> Result<Self, SealError> {
        let mut buf = Zeroizing::new([0u8; KEY_LEN]);
        rng.try_fill_bytes(&mut buf[..])
            .map_err(|_| SealError::RandomSourceFailure)?;
        Ok(Self(buf))
    }

    fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != KEY_LEN {
            return None;
        }
        let mut buf = Zeroizing::new([0u8; KEY_LEN]);
        buf.copy_from_slice(bytes);
        Some(Self(buf))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataKey([REDACTED])")
    }
}

/// The data key sealed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey {
    pub key_id: KeyId,
    pub blob: Vec<u8>,
}

/// Output of [`seal`]: everything needed to persist the Secret sealed.
#[derive(Debug, Clone)]
pub struct SealedPayload {
    pub algorithm: &'static str,
    pub recipients: Vec<WrappedKey>,
    pub fields: BTreeMap<String, EncryptedField>,
}

impl SealedPayload {
    /// Field key → self-contained token, one per sealed field.
    pub fn field_tokens(&self) -> BTreeMap<String, String> {
        let wrapped = self
            .recipients
            .iter()
            .map(|w| format!("{}:{}", w.key_id, URL_SAFE_NO_PAD.encode(&w.blob)))
            .collect::<Vec<_>>()
            .join(",");

        self.fields
            .iter()
            .map(|(key, field)| {
                let token = format!("{TOKEN_VERSION}.{wrapped}.{}", field.to_segments());
                (key.clone(), token)
            })
            .collect()
    }

    /// Comma-separated recipient key ids, primary first.
    pub fn recipient_ids(&self) -> String {
        self.recipients
            .iter()
            .map(|w| w.key_id.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Seal `fields` for every recipient in `keys`.
///
/// # Errors
///
/// Returns [`SealError::KeyMaterialUnavailable`] if `keys` is empty,
/// [`SealError::RandomSourceFailure`] if `rng` fails, and
/// [`SealError::Encryption`] / [`SealError::KeyWrap`] on a cipher failure.
pub fn seal(
    ctx: &SealContext<'_>,
    fields: &BTreeMap<String, Vec<u8>>,
    keys: &KeyRing,
    rng: &mut impl CryptoRngCore,
) -> Result<SealedPayload, SealError> {
    if keys.is_empty() {
        return Err(SealError::KeyMaterialUnavailable);
    }

    let data_key = DataKey::generate(rng)?;

    let mut sealed = BTreeMap::new();
    for (field, value) in fields {
        let encrypted = encrypt_field(value, &ctx.aad(field), data_key.as_bytes(), rng)
            .map_err(|e| match e {
                CipherError::RandomSource => SealError::RandomSourceFailure,
                _ => SealError::Encryption {
                    field: field.clone(),
                },
            })?;
        sealed.insert(field.clone(), encrypted);
    }

    let mut recipients = Vec::with_capacity(keys.len());
    for r in keys.recipients() {
        let blob = wrap_key(&r.public, data_key.as_bytes(), rng).map_err(|_| SealError::KeyWrap {
            key_id: r.key_id.clone(),
        })?;
        recipients.push(WrappedKey {
            key_id: r.key_id.clone(),
            blob,
        });
    }

    Ok(SealedPayload {
        algorithm: ALGORITHM,
        recipients,
        fields: sealed,
    })
}

// ---------------------------------------------------------------------------
// Unsealing
// ---------------------------------------------------------------------------

struct ParsedToken {
    recipients: Vec<WrappedKey>,
    field: EncryptedField,
}

fn parse_token(token: &str) -> Result<ParsedToken, OpenError> {
    let parts: Vec<&str> = token.splitn(4, '.').collect();
    let [version, wrapped, nonce, ciphertext] = parts[..] else {
        return Err(OpenError::InvalidToken);
    };
    if version != TOKEN_VERSION {
        return Err(OpenError::InvalidToken);
    }

    let mut recipients = Vec::new();
    for entry in wrapped.split(',') {
        let (kid, blob) = entry.split_once(':').ok_or(OpenError::InvalidToken)?;
        let blob = URL_SAFE_NO_PAD
            .decode(blob)
            .map_err(|_| OpenError::InvalidToken)?;
        recipients.push(WrappedKey {
            key_id: KeyId::from_hex(kid).ok_or(OpenError::InvalidToken)?,
            blob,
        });
    }

    let field =
        EncryptedField::from_segments(nonce, ciphertext).map_err(|_| OpenError::InvalidToken)?;
    Ok(ParsedToken { recipients, field })
}

fn unwrap_for(recipients: &[WrappedKey], secret: &SecretKey) -> Result<DataKey, OpenError> {
    let key_id = KeyId::of(&secret.public_key());
    let wrapped = recipients
        .iter()
        .find(|w| w.key_id == key_id)
        .ok_or(OpenError::NoMatchingRecipient(key_id))?;
    let raw = unwrap_key(secret, &wrapped.blob).map_err(|_| OpenError::Authentication)?;
    DataKey::from_slice(&raw).ok_or(OpenError::Authentication)
}

/// Whether `token` is a well-formed sealed field token.
///
/// Checks structure only; nothing is decrypted.
pub fn is_sealed_token(token: &str) -> bool {
    parse_token(token).is_ok()
}

/// Recover the data key a token was sealed under.
///
/// # Errors
///
/// See [`OpenError`].
pub fn open_data_key(token: &str, secret: &SecretKey) -> Result<DataKey, OpenError> {
    let parsed = parse_token(token)?;
    unwrap_for(&parsed.recipients, secret)
}

/// Decrypt one sealed field with a recipient's secret key.
///
/// `ctx` and `field` must match the values used when sealing.
///
/// # Errors
///
/// See [`OpenError`].
pub fn open_field(
    token: &str,
    ctx: &SealContext<'_>,
    field: &str,
    secret: &SecretKey,
) -> Result<Vec<u8>, OpenError> {
    let parsed = parse_token(token)?;
    let data_key = unwrap_for(&parsed.recipients, secret)?;
    decrypt_field(&parsed.field, &ctx.aad(field), data_key.as_bytes())
        .map_err(|_| OpenError::Authentication)
}
