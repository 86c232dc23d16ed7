//! `admission.k8s.io` review envelope exchanged with the Kubernetes API server.
//!
//! Only the fields the webhook reads or writes are modelled. Unknown fields in
//! inbound documents are ignored, so newer API servers remain compatible.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// API version assumed when an inbound envelope omits `apiVersion`.
pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";

/// API group every accepted review version must belong to.
pub const ADMISSION_GROUP: &str = "admission.k8s.io";

/// Kind of the review envelope in both directions.
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The outer `AdmissionReview` document.
///
/// Inbound reviews carry `request`; outbound reviews carry `response`. Both
/// type fields are optional on input so that older callers that omit them are
/// still accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

impl AdmissionReview {
    /// Wrap `response` in an outbound review stamped with `api_version`.
    pub fn from_response(api_version: impl Into<String>, response: AdmissionResponse) -> Self {
        Self {
            api_version: Some(api_version.into()),
            kind: Some(ADMISSION_REVIEW_KIND.into()),
            request: None,
            response: Some(response),
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// The operation that triggered the admission call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

/// Fully-qualified kind of the object under admission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionKind {
    /// Empty for the core API group.
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,
}

/// Fully-qualified resource of the object under admission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionResource {
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub resource: String,
}

/// The admission request embedded in an inbound review.
///
/// `object` is kept as raw JSON: it is decoded lazily and only by code that
/// knows which kind it expects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    /// Correlation id; must be echoed verbatim in the response.
    pub uid: String,

    pub kind: GroupVersionKind,

    #[serde(default)]
    pub resource: GroupVersionResource,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_resource: Option<String>,

    pub operation: Operation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Box<RawValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_object: Option<Box<RawValue>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// Patch formats understood by the API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchType {
    /// RFC 6902 JSON Patch; the only type admission webhooks may return.
    #[serde(rename = "JSONPatch")]
    JsonPatch,
}

/// Result details attached to a response, used for denials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,

    #[serde(default)]
    pub message: String,
}

/// The admission decision returned to the API server.
///
/// Construct through [`AdmissionResponse::allow`] and
/// [`AdmissionResponse::deny`] so that a denial can never carry a patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub uid: String,

    pub allowed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<PatchType>,

    /// Literal patch document. Base64 is applied only on the wire.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "base64_bytes")]
    pub patch: Option<Vec<u8>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl AdmissionResponse {
    /// An unconditional allow for `uid`, with no patch.
    pub fn allow(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: true,
            patch_type: None,
            patch: None,
            status: None,
            warnings: Vec::new(),
        }
    }

    /// A denial for `uid`. Any patch is dropped.
    pub fn deny(uid: impl Into<String>, code: u16, message: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: false,
            patch_type: None,
            patch: None,
            status: Some(Status {
                code: Some(code),
                message: message.into(),
            }),
            warnings: Vec::new(),
        }
    }

    /// Attach a patch. Ignored on a denial.
    pub fn with_patch(mut self, patch_type: PatchType, patch: Vec<u8>) -> Self {
        if self.allowed {
            self.patch_type = Some(patch_type);
            self.patch = Some(patch);
        }
        self
    }

    /// Append a warning shown to the client that issued the request.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_str(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|e| STANDARD.decode(e).map_err(serde::de::Error::custom))
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

/// Response body for `GET /readyz`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Overall service status: `"ok"` or `"no_recipients"`.
    pub status: String,
    /// Number of sealing recipients currently loaded.
    pub recipients: usize,
}
