//! Error types for the facilitator HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors surfaced by the facilitator's route handlers.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorError {
    /// The request body (or its nested payment request) is not valid JSON.
    #[error("invalid payment request: {0}")]
    InvalidBody(#[from] serde_json::Error),

    /// No record exists for the requested nonce.
    #[error("nonce not found: {0}")]
    NonceNotFound(String),
}

impl IntoResponse for FacilitatorError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidBody(_) => StatusCode::BAD_REQUEST,
            Self::NonceNotFound(_) => StatusCode::NOT_FOUND,
        };
        let body = serde_json::json!({ "success": false, "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
