//! Sealing key material: loading recipient public keys at startup.
//!
//! # Lifecycle
//!
//! 1. At startup, [`load`] reads the primary recipient key and any rotation
//!    recipient keys named in [`Config`].
//! 2. The resulting [`KeyRing`] is wrapped in an `Arc` and placed in the router
//!    state. It is never reloaded or regenerated while the process runs.
//!
//! # Key file format
//!
//! A key file holds the 32-byte X25519 public key, standard base64 encoded.
//! Surrounding whitespace and `#` comment lines are ignored.
//!
//! # Security invariants
//!
//! - Only public keys are ever loaded; the webhook cannot unseal anything.

pub mod ring;

pub use ring::{KeyError, KeyId, KeyRing, Recipient};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::info;

use crate::config::Config;

/// Load the primary and rotation recipients named in `cfg`.
///
/// # Errors
///
/// Returns an error if any configured key file is unreadable or does not hold
/// a valid X25519 public key. A missing rotation key is as fatal as a missing
/// primary key: sealing to fewer recipients than configured would silently
/// lock out an unsealer.
pub async fn load(cfg: &Config) -> Result<KeyRing> {
    let primary = load_recipient(&cfg.sealing_public_key_path).await?;

    let mut rotation = Vec::new();
    for path in cfg.rotation_key_paths() {
        rotation.push(load_recipient(path).await?);
    }

    let ring = KeyRing::new(primary, rotation);
    for r in ring.recipients() {
        info!(key_id = %r.key_id, "sealing recipient loaded");
    }
    Ok(ring)
}

async fn load_recipient(path: &str) -> Result<Recipient> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read sealing key file {path}"))?;
    parse_recipient(&contents).with_context(|| format!("invalid sealing key in {path}"))
}

/// Parse the contents of a key file.
pub fn parse_recipient(contents: &str) -> Result<Recipient, KeyError> {
    let encoded: String = contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();
    let raw = STANDARD
        .decode(encoded)
        .map_err(|_| KeyError::InvalidEncoding)?;
    Recipient::from_bytes(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm_siv::aead::OsRng;
    use crypto_box::SecretKey;

    #[test]
    fn parses_base64_with_comments() {
        let pk = SecretKey::generate(&mut OsRng).public_key();
        let contents = format!("# primary sealing key\n\n  {}  \n", STANDARD.encode(pk.as_bytes()));
        let r = parse_recipient(&contents).unwrap();
        assert_eq!(r.key_id, KeyId::of(&pk));
    }

    #[test]
    fn rejects_non_base64() {
        assert!(matches!(
            parse_recipient("not*base64"),
            Err(KeyError::InvalidEncoding)
        ));
    }

    #[test]
    fn rejects_short_key() {
        let contents = STANDARD.encode([1u8; 16]);
        assert!(matches!(
            parse_recipient(&contents),
            Err(KeyError::InvalidLength(16))
        ));
    }

    #[tokio::test]
    async fn load_fails_on_missing_file() {
        let cfg = Config {
            sealing_public_key_path: "/nonexistent/seal.pub".into(),
            ..Config::default()
        };
        assert!(load(&cfg).await.is_err());
    }

    #[tokio::test]
    async fn load_reads_primary_and_rotation_keys() {
        let dir = std::env::temp_dir().join(format!("auto-seal-keys-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let primary = SecretKey::generate(&mut OsRng).public_key();
        let rotation = SecretKey::generate(&mut OsRng).public_key();
        let primary_path = dir.join("primary.pub");
        let rotation_path = dir.join("rotation.pub");
        tokio::fs::write(&primary_path, STANDARD.encode(primary.as_bytes())).await.unwrap();
        tokio::fs::write(&rotation_path, STANDARD.encode(rotation.as_bytes())).await.unwrap();

        let cfg = Config {
            sealing_public_key_path: primary_path.to_string_lossy().into_owned(),
            sealing_rotation_key_paths: format!(" {} ,", rotation_path.to_string_lossy()),
            ..Config::default()
        };
        let ring = load(&cfg).await.unwrap();
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.recipients()[0].key_id, KeyId::of(&primary));
        assert_eq!(ring.recipients()[1].key_id, KeyId::of(&rotation));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
