//! Axum request handlers for all service endpoints.

use aes_gcm_siv::aead::OsRng;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::ReadinessResponse;
use common::ServiceError;
use tracing::{error, warn};

use super::state::AppState;
use crate::admission;

/// `POST /mutate`: admission review in, admission review out.
///
/// Every well-formed review yields `200` with a review carrying exactly one
/// response. Malformed envelopes get a plain-text `400` and no admission
/// structure at all, so the API server applies its own failure policy.
pub async fn mutate(State(state): State<AppState>, body: Bytes) -> Response {
    let review = match admission::review(&body, &state.keys, &state.policy, &mut OsRng) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "rejecting admission review");
            return error_response(&e);
        }
    };

    match serde_json::to_vec(&review) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            let e = ServiceError::ResponseConstruction(e.to_string());
            error!(error = %e, "failed to encode admission review");
            error_response(&e)
        }
    }
}

/// `GET /healthz`: liveness.
pub async fn healthz() -> &'static str {
    "OK"
}

/// `GET /readyz`: ready once at least one sealing recipient is loaded.
pub async fn readyz(State(state): State<AppState>) -> Response {
    let recipients = state.keys.len();
    let (code, status) = if recipients > 0 {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "no_recipients")
    };
    let body = ReadinessResponse {
        status: status.into(),
        recipients,
    };
    (code, Json(body)).into_response()
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

fn error_response(e: &ServiceError) -> Response {
    let code = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, e.to_string()).into_response()
}
