//! Limits enforced by the middleware stack in front of the handlers.

use std::time::Duration;

use crate::config::Config;

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on an admission review body.
pub const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Per-request limits applied by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Limits {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
            max_body_bytes: cfg.max_body_bytes,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            request_timeout: REQUEST_TIMEOUT,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }
}
