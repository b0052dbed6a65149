//! Error taxonomy of the payment gate.
//!
//! Every failure path of the per-request state machine maps to a structured
//! JSON response with a stable `code` field; the gate never lets a
//! facilitator-side fault crash request handling. A missing payment header is
//! not represented here — challenging is an expected flow state, not an
//! error.

use axum_core::body::Body;
use axum_core::response::{IntoResponse, Response};
use http::StatusCode;
use http::header::CONTENT_TYPE;
use serde_json::json;

/// Failures of the payment gate's verify/settle state machine.
#[derive(Debug, thiserror::Error)]
pub enum PaymentGateError {
    /// The `X-PAYMENT` header is present but not a payment authorization.
    #[error("X-PAYMENT header must contain valid JSON")]
    MalformedAuthorization,

    /// The facilitator rejected the authorization.
    #[error("payment verification failed: {0}")]
    VerificationFailed(String),

    /// The facilitator could not settle the transfer.
    #[error("payment settlement failed: {0}")]
    SettlementFailed(String),

    /// The facilitator exchange itself failed (transport fault after
    /// retries, undecodable answer, or any other unanticipated fault).
    #[error("payment processing failed: {0}")]
    Processing(String),
}

impl PaymentGateError {
    /// Stable machine-readable code carried in the response body.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MalformedAuthorization => "INVALID_PAYMENT_FORMAT",
            Self::VerificationFailed(_) => "PAYMENT_VERIFICATION_FAILED",
            Self::SettlementFailed(_) => "PAYMENT_SETTLEMENT_FAILED",
            Self::Processing(_) => "PAYMENT_PROCESSING_ERROR",
        }
    }

    /// HTTP status of the response this error maps to.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MalformedAuthorization => StatusCode::BAD_REQUEST,
            Self::VerificationFailed(_) | Self::SettlementFailed(_) => {
                StatusCode::PAYMENT_REQUIRED
            }
            Self::Processing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Human-readable title carried in the response body's `error` field.
    const fn title(&self) -> &'static str {
        match self {
            Self::MalformedAuthorization => "Invalid Payment Request",
            Self::VerificationFailed(_) => "Payment Verification Failed",
            Self::SettlementFailed(_) => "Payment Settlement Failed",
            Self::Processing(_) => "Internal Server Error",
        }
    }

    /// Message carried in the response body.
    ///
    /// Processing faults deliberately hide their detail from the caller; the
    /// gate logs it server-side instead.
    fn message(&self) -> String {
        match self {
            Self::MalformedAuthorization => "X-PAYMENT header must contain valid JSON".to_owned(),
            Self::VerificationFailed(reason) | Self::SettlementFailed(reason) => reason.clone(),
            Self::Processing(_) => "Payment processing failed".to_owned(),
        }
    }
}

impl IntoResponse for PaymentGateError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.title(),
            "message": self.message(),
            "code": self.code(),
        });
        Response::builder()
            .status(self.status())
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("response construction cannot fail")
    }
}
