//! Configuration loading and validation for the webhook service.
//!
//! All values are read from environment variables at startup. The process will
//! exit with a clear error message if any variable is invalid.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Upper bound the API server accepts for `timeoutSeconds` on a webhook.
const MAX_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Validated webhook service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTPS server listens on.
    #[serde(default = "default_tls_port")]
    pub tls_port: u16,

    /// Filesystem path to the PEM-encoded TLS certificate chain.
    #[serde(default = "default_tls_cert_path")]
    pub tls_cert_path: String,

    /// Filesystem path to the PEM-encoded TLS private key.
    #[serde(default = "default_tls_key_path")]
    pub tls_key_path: String,

    /// Path to the primary recipient's base64 X25519 public key.
    #[serde(default = "default_sealing_public_key_path")]
    pub sealing_public_key_path: String,

    /// Comma-separated paths to additional recipient keys. Every data key is
    /// also wrapped to each of these while a rotation is in progress.
    #[serde(default)]
    pub sealing_rotation_key_paths: String,

    /// Annotation a Secret sets to opt into sealing.
    #[serde(default = "default_trigger_annotation")]
    pub trigger_annotation: String,

    /// Exact, case-sensitive value of the trigger annotation that opts in.
    #[serde(default = "default_trigger_value")]
    pub trigger_value: String,

    /// Prefix of the annotations written onto sealed Secrets.
    #[serde(default = "default_sealed_annotation_prefix")]
    pub sealed_annotation_prefix: String,

    /// Per-request timeout. Must not exceed the API server's own limit.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Largest admission review body accepted, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// OTLP endpoint for span export. Logs only when unset.
    #[serde(default)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Tracing log level (e.g. `"info"`, `"debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_tls_port() -> u16 {
    8443
}
fn default_tls_cert_path() -> String {
    "/tls/tls.crt".into()
}
fn default_tls_key_path() -> String {
    "/tls/tls.key".into()
}
fn default_sealing_public_key_path() -> String {
    "/sealing/seal.pub".into()
}
fn default_trigger_annotation() -> String {
    "auto-seal".into()
}
fn default_trigger_value() -> String {
    "true".into()
}
fn default_sealed_annotation_prefix() -> String {
    "auto-seal.io".into()
}
fn default_request_timeout() -> u64 {
    10
}
fn default_max_body_bytes() -> usize {
    8 * 1024 * 1024
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tls_port: default_tls_port(),
            tls_cert_path: default_tls_cert_path(),
            tls_key_path: default_tls_key_path(),
            sealing_public_key_path: default_sealing_public_key_path(),
            sealing_rotation_key_paths: String::new(),
            trigger_annotation: default_trigger_annotation(),
            trigger_value: default_trigger_value(),
            sealed_annotation_prefix: default_sealed_annotation_prefix(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            otel_exporter_otlp_endpoint: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable cannot be parsed or fails validation.
    pub fn from_env() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("failed to build configuration from environment")?;

        let c: Config = cfg
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    /// Rotation recipient key paths, blanks removed.
    pub fn rotation_key_paths(&self) -> impl Iterator<Item = &str> {
        self.sealing_rotation_key_paths
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Validate all fields, returning a descriptive error on the first failure.
    fn validate(&self) -> Result<()> {
        ensure_non_empty(&self.tls_cert_path, "TLS_CERT_PATH")?;
        ensure_non_empty(&self.tls_key_path, "TLS_KEY_PATH")?;
        ensure_non_empty(&self.sealing_public_key_path, "SEALING_PUBLIC_KEY_PATH")?;
        ensure_non_empty(&self.trigger_annotation, "TRIGGER_ANNOTATION")?;
        ensure_non_empty(&self.trigger_value, "TRIGGER_VALUE")?;
        ensure_non_empty(&self.sealed_annotation_prefix, "SEALED_ANNOTATION_PREFIX")?;

        if self.sealed_annotation_prefix.contains('/') {
            anyhow::bail!("SEALED_ANNOTATION_PREFIX must be a bare domain without '/'");
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > MAX_REQUEST_TIMEOUT_SECS {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be between 1 and {MAX_REQUEST_TIMEOUT_SECS}");
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("MAX_BODY_BYTES must be > 0");
        }
        Ok(())
    }
}

fn ensure_non_empty(value: &str, name: &str) -> Result<()> {
    if value.trim().is_empty() {
        anyhow::bail!("{name} is required and must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_correct() {
        assert_eq!(default_tls_port(), 8443);
        assert_eq!(default_tls_cert_path(), "/tls/tls.crt");
        assert_eq!(default_tls_key_path(), "/tls/tls.key");
        assert_eq!(default_trigger_annotation(), "auto-seal");
        assert_eq!(default_trigger_value(), "true");
        assert_eq!(default_request_timeout(), 10);
        assert_eq!(default_log_level(), "info");
    }

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_cert_path() {
        let cfg = Config {
            tls_cert_path: " ".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_timeout_above_api_server_limit() {
        let cfg = Config {
            request_timeout_secs: 31,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_prefix_with_slash() {
        let cfg = Config {
            sealed_annotation_prefix: "auto-seal.io/x".into(),
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rotation_paths_skip_blanks() {
        let cfg = Config {
            sealing_rotation_key_paths: " /a.pub, ,/b.pub,".into(),
            ..Config::default()
        };
        assert_eq!(cfg.rotation_key_paths().collect::<Vec<_>>(), vec!["/a.pub", "/b.pub"]);
    }

    #[test]
    fn no_rotation_paths_by_default() {
        assert_eq!(Config::default().rotation_key_paths().count(), 0);
    }
}
