//! Typed request-scoped values threaded through the handler chain.
//!
//! Rather than mutating a shared request structure, the gate communicates
//! with its neighbors through typed request extensions: upstream
//! collaborators may set a [`PricingContext`] or [`CorrelationId`] before the
//! gate runs, and the gate inserts a [`VerifiedPayment`] for the protected
//! handler once settlement succeeds.

use axum_core::extract::FromRequestParts;
use http::StatusCode;
use http::request::Parts;

/// Per-request pricing established by an upstream collaborator.
///
/// Read by routes whose `amount`/`payTo` terms are
/// [`ConfigValue::FromContext`](crate::server::ConfigValue::FromContext).
#[derive(Debug, Clone, Default)]
pub struct PricingContext {
    /// Effective amount for this request, in base units.
    pub amount: Option<String>,
    /// Effective recipient for this request.
    pub pay_to: Option<String>,
}

/// Caller-supplied correlation identifier echoed in 402 challenges.
///
/// When absent, the gate generates one per challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

/// Settlement outcome attached to the request once payment completes.
///
/// The protected handler observes this either by reading the request
/// extension directly or through the axum extractor implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    /// Always `true`; present for wire-format parity with the payment info
    /// exposed to downstream business logic.
    pub verified: bool,
    /// Nonce consumed by the settlement.
    pub nonce: String,
    /// Amount that was paid, in base units.
    pub amount: String,
    /// Recipient of the payment.
    pub recipient: String,
    /// Identifier of the resource that was paid for.
    pub resource_id: String,
    /// Ledger reference of the executed transfer.
    pub transaction_signature: String,
}

impl<S> FromRequestParts<S> for VerifiedPayment
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Only reachable when the handler is not actually behind the gate.
        parts.extensions.get::<Self>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "handler expects a verified payment but is not behind the payment gate",
        ))
    }
}
