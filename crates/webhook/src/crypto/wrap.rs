//! Data-key wrapping with X25519 sealed boxes.
//!
//! A sealed box generates an ephemeral X25519 keypair per call, derives a
//! shared secret with the recipient's public key, and encrypts with
//! XSalsa20-Poly1305. The ephemeral public key is prepended to the output, so
//! only the recipient's secret key is needed to open it.

use aes_gcm_siv::aead::rand_core::CryptoRngCore;
use crypto_box::{PublicKey, SecretKey};
use thiserror::Error;
use zeroize::Zeroizing;

/// Byte length of an X25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Bytes added by sealing: ephemeral public key plus Poly1305 tag.
pub const SEAL_OVERHEAD: usize = 48;

/// Errors produced by the key-wrapping layer.
#[derive(Debug, Error)]
pub enum WrapError {
    /// Sealing the data key to a recipient failed.
    #[error("failed to wrap data key")]
    Seal,

    /// The wrapped blob could not be opened: wrong key or tampered data.
    #[error("failed to unwrap data key")]
    Open,
}

/// Seal `key` to `recipient`.
///
/// # Errors
///
/// Returns [`WrapError::Seal`] if the sealed box cannot be produced.
pub fn wrap_key(
    recipient: &PublicKey,
    key: &[u8],
    rng: &mut impl CryptoRngCore,
) -> Result<Vec<u8>, WrapError> {
    recipient.seal(rng, key).map_err(|_| WrapError::Seal)
}

/// Open a blob produced by [`wrap_key`] with the recipient's secret key.
///
/// # Errors
///
/// Returns [`WrapError::Open`] if authentication fails.
pub fn unwrap_key(secret: &SecretKey, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>, WrapError> {
    secret
        .unseal(wrapped)
        .map(Zeroizing::new)
        .map_err(|_| WrapError::Open)
}
