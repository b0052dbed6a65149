//! Settlement of verified payment authorizations.
//!
//! [`SettlementExecutor`] turns a verified authorization into an executed
//! value transfer. The transfer network itself is an injected
//! [`TransferNetwork`] capability ("submit transfer, await confirmation,
//! return reference"); the in-tree [`SimulatedTransfers`] implementation
//! backs the facilitator's simulation mode.
//!
//! Idempotency contract: the executor atomically consumes the nonce
//! (`active → used`) immediately before submitting the transfer. Checks that
//! fail *before* that point leave the nonce untouched, so the caller may
//! retry with the same nonce until it expires. Once consumed, the nonce is
//! never rolled back — a submission failure or confirmation timeout may mean
//! a transfer partially happened, and rejecting a replay is preferred over
//! risking a double settlement.

use std::sync::Arc;

use async_trait::async_trait;
use rand::RngCore;

use s402::proto::{PaymentAuthorization, SettlementResult};

use crate::registry::NonceRegistry;
use crate::verify::{AuthorizationVerifier, ExpectedTerms};

/// Failure of the underlying value transfer.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The transfer could not be submitted.
    #[error("transfer submission failed: {0}")]
    Submission(String),

    /// The transfer was submitted but confirmation timed out.
    #[error("transfer confirmation timed out")]
    ConfirmationTimeout,
}

/// An opaque value-transfer capability.
///
/// Implementations submit the transfer corresponding to an authorization,
/// await confirmation, and return the ledger reference.
#[async_trait]
pub trait TransferNetwork: Send + Sync {
    /// Submits the transfer and returns its transaction signature.
    async fn submit_transfer(
        &self,
        authorization: &PaymentAuthorization,
    ) -> Result<String, TransferError>;
}

/// Transfer network that fabricates confirmations instead of touching a
/// ledger. Used when the facilitator runs with `SIMULATE_TRANSACTIONS`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedTransfers;

#[async_trait]
impl TransferNetwork for SimulatedTransfers {
    async fn submit_transfer(
        &self,
        authorization: &PaymentAuthorization,
    ) -> Result<String, TransferError> {
        let mut bytes = [0u8; 64];
        rand::rng().fill_bytes(&mut bytes);
        let signature = bs58::encode(bytes).into_string();
        tracing::info!(
            nonce = %authorization.payload.nonce,
            amount = %authorization.payload.amount,
            recipient = %authorization.payload.recipient,
            signature = %signature,
            "Simulated transfer"
        );
        Ok(signature)
    }
}

/// Executes the transfer for a verified authorization.
#[derive(Clone)]
#[allow(missing_debug_implementations)] // trait object field
pub struct SettlementExecutor {
    registry: Arc<NonceRegistry>,
    verifier: AuthorizationVerifier,
    network: Arc<dyn TransferNetwork>,
}

impl SettlementExecutor {
    /// Creates an executor over the shared registry and transfer network.
    ///
    /// The verifier re-runs the full authorization checks at settlement time,
    /// so `/settle` is safe to call without a preceding `/verify`.
    #[must_use]
    pub fn new(
        registry: Arc<NonceRegistry>,
        verifier: AuthorizationVerifier,
        network: Arc<dyn TransferNetwork>,
    ) -> Self {
        Self {
            registry,
            verifier,
            network,
        }
    }

    /// Settles an authorization.
    ///
    /// Re-validates, atomically consumes the nonce, then submits the
    /// transfer. Exactly one of any number of concurrent attempts on the same
    /// nonce reaches submission; the rest observe `nonce already used`.
    pub async fn settle(
        &self,
        authorization: &PaymentAuthorization,
        expected: &ExpectedTerms,
    ) -> SettlementResult {
        let pre_check = self.verifier.verify(authorization, expected);
        if !pre_check.is_valid {
            let reason = pre_check
                .error
                .unwrap_or_else(|| "authorization rejected".to_owned());
            return SettlementResult::error(reason);
        }

        let nonce = &authorization.payload.nonce;
        if !self.registry.mark_used(nonce) {
            tracing::debug!(%nonce, "Settlement lost the nonce race");
            return SettlementResult::error("nonce already used");
        }

        match self.network.submit_transfer(authorization).await {
            Ok(signature) => {
                tracing::info!(%nonce, %signature, "Settled");
                SettlementResult::settled(signature)
            }
            Err(err) => {
                // The nonce stays consumed: the transfer may have been
                // submitted, and replay is worse than a wasted nonce.
                tracing::warn!(%nonce, error = %err, "Transfer failed after nonce consumption");
                SettlementResult::error(err.to_string())
            }
        }
    }
}
