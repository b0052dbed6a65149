//! Axum route handlers for the facilitator service.
//!
//! `POST /verify` and `POST /settle` are the transaction-critical path; the
//! remaining endpoints are observational (`/health`, `/nonce/{nonce}`,
//! `/stats`) or operational (`DELETE /cleanup-nonces`).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};

use s402::proto::{
    CleanupData, Envelope, HealthData, NonceRecord, NonceStats, SettlementResult,
    VerificationResult, VerifyRequest,
};
use s402::timestamp::UnixMillis;

use crate::error::FacilitatorError;
use crate::registry::NonceRegistry;
use crate::settle::SettlementExecutor;
use crate::verify::{AuthorizationVerifier, ExpectedTerms};

/// Shared application state for the facilitator service.
#[derive(Clone)]
#[allow(missing_debug_implementations)] // executor holds a trait object
pub struct FacilitatorState {
    /// Authorization verifier.
    pub verifier: AuthorizationVerifier,
    /// Settlement executor.
    pub executor: SettlementExecutor,
    /// The nonce registry backing both.
    pub registry: Arc<NonceRegistry>,
    /// The facilitator's payment address, reported by `/health`.
    pub address: String,
}

/// Shared state handle passed to every handler.
pub type SharedState = Arc<FacilitatorState>;

impl ExpectedTerms {
    /// Expected terms as carried by a verify/settle request body.
    fn from_request(request: &VerifyRequest) -> Self {
        Self {
            amount: request.expected_amount.clone(),
            asset: request.asset.clone(),
            network: request.network.clone(),
        }
    }
}

/// `GET /health` — liveness plus the facilitator address.
pub async fn get_health(State(state): State<SharedState>) -> Json<Envelope<HealthData>> {
    Json(Envelope::ok(HealthData {
        facilitator: state.address.clone(),
        timestamp: UnixMillis::now(),
    }))
}

/// `POST /verify` — verifies a payment authorization.
///
/// # Errors
///
/// Returns 400 if the nested payment request is not valid JSON.
pub async fn post_verify(
    State(state): State<SharedState>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<VerificationResult>, FacilitatorError> {
    let authorization = body.authorization()?;
    let expected = ExpectedTerms::from_request(&body);
    Ok(Json(state.verifier.verify(&authorization, &expected)))
}

/// `POST /settle` — settles a verified payment authorization.
///
/// # Errors
///
/// Returns 400 if the nested payment request is not valid JSON. Settlement
/// failures are reported in-band with `status: "error"`.
pub async fn post_settle(
    State(state): State<SharedState>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<SettlementResult>, FacilitatorError> {
    let authorization = body.authorization()?;
    let expected = ExpectedTerms::from_request(&body);
    Ok(Json(state.executor.settle(&authorization, &expected).await))
}

/// `GET /nonce/{nonce}` — looks up a nonce record.
///
/// # Errors
///
/// Returns 404 if the registry holds no record for the nonce.
pub async fn get_nonce(
    State(state): State<SharedState>,
    Path(nonce): Path<String>,
) -> Result<Json<NonceRecord>, FacilitatorError> {
    state
        .registry
        .get(&nonce)
        .map(Json)
        .ok_or(FacilitatorError::NonceNotFound(nonce))
}

/// `GET /stats` — aggregate nonce counts.
pub async fn get_stats(State(state): State<SharedState>) -> Json<Envelope<NonceStats>> {
    Json(Envelope::ok(state.registry.stats()))
}

/// `DELETE /cleanup-nonces` — forces an immediate sweep.
pub async fn delete_cleanup_nonces(
    State(state): State<SharedState>,
) -> Json<Envelope<CleanupData>> {
    let removed = state.registry.sweep_expired();
    tracing::info!(removed, "Operator-triggered nonce sweep");
    Json(Envelope::ok(CleanupData { removed }))
}

/// Builds the facilitator [`Router`] with all endpoints.
pub fn facilitator_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/verify", post(post_verify))
        .route("/settle", post(post_settle))
        .route("/nonce/{nonce}", get(get_nonce))
        .route("/stats", get(get_stats))
        .route("/cleanup-nonces", delete(delete_cleanup_nonces))
        .with_state(state)
}
