//! Decoding and validation of the inbound `AdmissionReview` envelope.
//!
//! Input is permissive on version skew: a missing `apiVersion` or `kind` is
//! defaulted, and any `admission.k8s.io` version is accepted. The version that
//! was negotiated is returned so the response can echo it.

use common::protocol::{
    AdmissionRequest, AdmissionReview, ADMISSION_API_VERSION, ADMISSION_GROUP,
    ADMISSION_REVIEW_KIND,
};
use common::ServiceError;

/// A review whose envelope has been validated.
#[derive(Debug)]
pub struct ParsedReview {
    /// The `apiVersion` the response must be stamped with.
    pub api_version: String,
    pub request: AdmissionRequest,
}

/// Parse raw request bytes into a [`ParsedReview`].
///
/// # Errors
///
/// Returns [`ServiceError::MalformedEnvelope`] if the body is not JSON, is not
/// an `AdmissionReview`, or carries an empty uid, and
/// [`ServiceError::MissingRequestBody`] if there is no embedded request.
pub fn parse(body: &[u8]) -> Result<ParsedReview, ServiceError> {
    let review: AdmissionReview = serde_json::from_slice(body)
        .map_err(|e| ServiceError::MalformedEnvelope(e.to_string()))?;

    if let Some(kind) = review.kind.as_deref() {
        if kind != ADMISSION_REVIEW_KIND {
            return Err(ServiceError::MalformedEnvelope(format!(
                "unexpected kind {kind:?}, expected {ADMISSION_REVIEW_KIND}"
            )));
        }
    }

    let api_version = match review.api_version {
        Some(v) if is_admission_version(&v) => v,
        Some(v) => {
            return Err(ServiceError::MalformedEnvelope(format!(
                "unsupported apiVersion {v:?}"
            )))
        }
        None => ADMISSION_API_VERSION.to_owned(),
    };

    let request = review.request.ok_or(ServiceError::MissingRequestBody)?;
    if request.uid.trim().is_empty() {
        return Err(ServiceError::MalformedEnvelope("request.uid is empty".into()));
    }

    Ok(ParsedReview {
        api_version,
        request,
    })
}

fn is_admission_version(api_version: &str) -> bool {
    api_version
        .split_once('/')
        .is_some_and(|(group, version)| group == ADMISSION_GROUP && !version.is_empty())
}
