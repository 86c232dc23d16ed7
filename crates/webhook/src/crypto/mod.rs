//! Envelope encryption primitives for sealing Secret data.
//!
//! This module is intentionally free of HTTP and admission dependencies.
//!
//! - [`cipher`]: AES-256-GCM-SIV per-field encryption with associated data.
//! - [`wrap`]: X25519 sealed-box wrapping of the per-request data key.
//! - [`envelope`]: the sealing engine tying both together, plus the
//!   unseal routines used to verify its output.

pub mod cipher;
pub mod envelope;
pub mod wrap;

pub use envelope::{is_sealed_token, open_field, seal, OpenError, SealContext, SealError, SealedPayload, ALGORITHM};
