//! Builds the single `AdmissionResponse` returned for each request.

use common::protocol::{AdmissionRequest, AdmissionResponse, AdmissionReview, PatchType};

/// Status code carried in a denial caused by a sealing failure.
pub const SEALING_FAILED_CODE: u16 = 500;

/// Allow `request`, optionally with a patch.
pub fn allow(request: &AdmissionRequest, patch: Option<(PatchType, Vec<u8>)>) -> AdmissionResponse {
    let response = AdmissionResponse::allow(request.uid.as_str());
    match patch {
        Some((patch_type, bytes)) => response.with_patch(patch_type, bytes),
        None => response,
    }
}

/// Deny `request` with a message that is shown to the client.
///
/// The message must never contain secret material.
pub fn deny(request: &AdmissionRequest, message: impl Into<String>) -> AdmissionResponse {
    AdmissionResponse::deny(request.uid.as_str(), SEALING_FAILED_CODE, message)
}

/// Wrap `response` in the outbound envelope for the negotiated `api_version`.
pub fn into_review(api_version: &str, response: AdmissionResponse) -> AdmissionReview {
    AdmissionReview::from_response(api_version, response)
}
