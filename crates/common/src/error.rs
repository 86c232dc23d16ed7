//! Common error types shared across crates.

use thiserror::Error;

/// Transport-level service error.
///
/// These are the failures that prevent an admission decision from being
/// communicated at all. Policy outcomes (allow, deny) are never errors; they
/// travel inside a well-formed `AdmissionReview` with HTTP 200.
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ServiceError::MalformedEnvelope`] → 400
/// - [`ServiceError::MissingRequestBody`] → 400
/// - [`ServiceError::ResponseConstruction`] → 500
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The body is not a decodable admission review envelope.
    #[error("malformed admission review: {0}")]
    MalformedEnvelope(String),

    /// The envelope decoded but carries no embedded `request` object.
    #[error("admission review has no request")]
    MissingRequestBody,

    /// The outbound admission review could not be serialised.
    #[error("failed to construct admission response: {0}")]
    ResponseConstruction(String),
}

impl ServiceError {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::MalformedEnvelope(_) => 400,
            ServiceError::MissingRequestBody => 400,
            ServiceError::ResponseConstruction(_) => 500,
        }
    }

    /// Returns `true` if the caller sent something this service cannot interpret.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }
}
