//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::admission::SealPolicy;
use crate::keys::KeyRing;

/// Application state shared across all request handlers.
///
/// Both fields are `Arc`-wrapped and read-only after startup, so cloning the
/// state per request is cheap and handlers never contend on a lock.
#[derive(Clone)]
pub struct AppState {
    /// Recipients every data key is wrapped to.
    pub keys: Arc<KeyRing>,
    /// Opt-in trigger and sealed-annotation names.
    pub policy: Arc<SealPolicy>,
}

impl AppState {
    pub fn new(keys: KeyRing, policy: SealPolicy) -> Self {
        Self {
            keys: Arc::new(keys),
            policy: Arc::new(policy),
        }
    }
}

impl Default for AppState {
    /// An empty key ring and the default policy, suitable for tests.
    fn default() -> Self {
        Self::new(KeyRing::empty(), SealPolicy::default())
    }
}
