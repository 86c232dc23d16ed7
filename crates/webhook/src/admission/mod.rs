//! The admission pipeline: envelope → eligibility → sealing → patch → response.
//!
//! ```text
//! Received ─▶ Parsed ─┬─▶ Ineligible ─▶ Allow (no patch)
//!                     └─▶ Eligible ─▶ Sealing ─┬─▶ Allow (with patch)
//!                                              └─▶ Deny
//! Received ─▶ ClientError (malformed envelope / missing request)
//! ```
//!
//! Failures around the cryptographic step deny the request: an object that
//! asked to be sealed is never persisted unsealed. Everything else fails open.

pub mod envelope;
pub mod matcher;
pub mod patch;
pub mod response;

pub use matcher::{Decision, Ineligible, SealPolicy};

use std::collections::BTreeMap;

use aes_gcm_siv::aead::rand_core::CryptoRngCore;
use common::protocol::{AdmissionRequest, AdmissionResponse, AdmissionReview, PatchType};
use common::ServiceError;
use k8s_openapi::api::core::v1::Secret;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::crypto::{seal, SealContext, SealError};
use crate::keys::KeyRing;
use patch::PatchError;

/// Why an eligible Secret could not be sealed.
#[derive(Debug, Error)]
enum SealingFailure {
    #[error(transparent)]
    Seal(#[from] SealError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("no patch produced for sealed payload")]
    EmptyPatch,
}

/// Run the whole pipeline over a raw request body.
///
/// Returns exactly one outbound review for every well-formed envelope.
///
/// # Errors
///
/// Returns a client-side [`ServiceError`] when the envelope is malformed or
/// has no request; no admission decision is attempted in that case.
pub fn review(
    body: &[u8],
    keys: &KeyRing,
    policy: &SealPolicy,
    rng: &mut impl CryptoRngCore,
) -> Result<AdmissionReview, ServiceError> {
    let parsed = envelope::parse(body)?;
    let response = decide(&parsed.request, keys, policy, rng);
    Ok(response::into_review(&parsed.api_version, response))
}

/// Produce the admission decision for a parsed request.
pub fn decide(
    request: &AdmissionRequest,
    keys: &KeyRing,
    policy: &SealPolicy,
    rng: &mut impl CryptoRngCore,
) -> AdmissionResponse {
    let secret = match matcher::evaluate(request, policy) {
        Decision::NotEligible(reason) => {
            debug!(
                uid = %request.uid,
                kind = %request.kind.kind,
                operation = ?request.operation,
                outcome = "allowed",
                reason = reason.as_str(),
                "admission allowed unchanged"
            );
            return response::allow(request, None);
        }
        Decision::Eligible(secret) => secret,
    };

    let ctx = SealContext {
        namespace: request
            .namespace
            .as_deref()
            .or(secret.metadata.namespace.as_deref())
            .unwrap_or_default(),
        name: request
            .name
            .as_deref()
            .or(secret.metadata.name.as_deref())
            .unwrap_or_default(),
    };

    match seal_secret(&ctx, &secret, keys, policy, rng) {
        Ok((patch, fields)) => {
            info!(
                uid = %request.uid,
                namespace = ctx.namespace,
                name = ctx.name,
                outcome = "sealed",
                fields,
                recipients = keys.len(),
                "secret sealed"
            );
            response::allow(request, Some(patch)).with_warning(format!(
                "{fields} secret field(s) sealed for {} recipient(s)",
                keys.len()
            ))
        }
        Err(e) => {
            warn!(
                uid = %request.uid,
                namespace = ctx.namespace,
                name = ctx.name,
                outcome = "denied",
                error = %e,
                "secret sealing failed; denying"
            );
            response::deny(request, format!("secret sealing failed: {e}"))
        }
    }
}

fn seal_secret(
    ctx: &SealContext<'_>,
    secret: &Secret,
    keys: &KeyRing,
    policy: &SealPolicy,
    rng: &mut impl CryptoRngCore,
) -> Result<((PatchType, Vec<u8>), usize), SealingFailure> {
    let fields = plaintext_fields(secret);
    let sealed = seal(ctx, &fields, keys, rng)?;
    let patch = patch::build(secret, Some(&sealed), policy)?
        .ok_or(SealingFailure::EmptyPatch)?;
    Ok((patch, fields.len()))
}

/// The field map the API server would persist: `data` overlaid with
/// `stringData`, which wins on key collisions.
fn plaintext_fields(secret: &Secret) -> BTreeMap<String, Vec<u8>> {
    let mut fields: BTreeMap<String, Vec<u8>> = secret
        .data
        .iter()
        .flatten()
        .map(|(k, v)| (k.clone(), v.0.clone()))
        .collect();
    for (k, v) in secret.string_data.iter().flatten() {
        fields.insert(k.clone(), v.clone().into_bytes());
    }
    fields
}
