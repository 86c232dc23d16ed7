//! Mutating admission webhook that seals opted-in Kubernetes Secrets.
//!
//! A Secret annotated with the trigger annotation is intercepted on CREATE.
//! Every value in `data`/`stringData` is encrypted under a fresh data key,
//! the data key is wrapped to each configured X25519 recipient, and a JSON
//! Patch replacing the plaintext with sealed tokens is returned to the API
//! server. Plaintext never reaches etcd.

pub mod admission;
pub mod config;
pub mod crypto;
pub mod keys;
pub mod server;
pub mod telemetry;
