//! Gateway-wide error type.
//!
//! One variant per error category the gateway distinguishes: each maps to
//! one HTTP status and one handling rule (forward or not, audit or not).
//! `IntoResponse` renders a FHIR `OperationOutcome`, the same shape REST
//! clients already expect from the upstream store.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing/invalid bearer token, or a required claim is absent.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// No Composition for `applicationId`, or no/invalid `syncStrategy`.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A checker in the chain denied the request.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Upstream returned a client/server error during resolution or
    /// forwarding; `status` is the upstream status when known.
    #[error("upstream error ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// Upstream could not be reached at all (connect/timeout failure).
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Anything else — a bug, not a modeled condition.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            GatewayError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn issue_code(&self) -> &'static str {
        match self {
            GatewayError::Unauthenticated(_) => "login",
            GatewayError::Configuration(_) => "processing",
            GatewayError::Forbidden(_) => "forbidden",
            GatewayError::Upstream { .. } => "transient",
            GatewayError::UpstreamUnavailable(_) => "transient",
            GatewayError::Internal(_) => "exception",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "resourceType": "OperationOutcome",
            "issue": [{
                "severity": "error",
                "code": self.issue_code(),
                "diagnostics": self.to_string(),
            }]
        });
        (status, Json(body)).into_response()
    }
}
