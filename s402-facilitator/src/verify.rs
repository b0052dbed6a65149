//! Payment authorization verification.
//!
//! [`AuthorizationVerifier`] runs the facilitator-side checks over a client's
//! signed authorization: signature, replay nonce, expected terms, and the
//! validity window — in that order, returning the first failure.
//!
//! Verification never consumes the nonce. A nonce is only consumed by a
//! successful settlement, so verify-then-fail-to-settle sequences can retry
//! with the same nonce until it expires.

use std::sync::Arc;

use s402::proto::{NonceState, PaymentAuthorization, VerificationResult};
use s402::signing;
use s402::timestamp::UnixMillis;

use crate::registry::NonceRegistry;

/// Terms the resource server expects the authorization to match.
///
/// An absent `amount` means the facilitator falls back to the authorization's
/// own claimed amount; absent `asset`/`network` skip that comparison.
#[derive(Debug, Clone, Default)]
pub struct ExpectedTerms {
    /// Expected amount in base units.
    pub amount: Option<String>,
    /// Expected asset identifier.
    pub asset: Option<String>,
    /// Expected settlement network.
    pub network: Option<String>,
}

/// Facilitator-side authorization verifier.
#[derive(Debug, Clone)]
pub struct AuthorizationVerifier {
    registry: Arc<NonceRegistry>,
    network: String,
    asset: Option<String>,
}

impl AuthorizationVerifier {
    /// Creates a verifier over the given nonce registry.
    ///
    /// `network` is the settlement network this facilitator serves; `asset`
    /// optionally pins the asset it settles in. Both are compared against the
    /// caller's expected terms when those are supplied.
    #[must_use]
    pub fn new(registry: Arc<NonceRegistry>, network: String, asset: Option<String>) -> Self {
        Self {
            registry,
            network,
            asset,
        }
    }

    /// Verifies an authorization against the expected terms.
    ///
    /// Checks run in a fixed order and the first failure wins:
    /// signature over the canonical message, nonce state (registering unseen
    /// nonces as active), amount/asset/network, then the timestamp/expiry
    /// window.
    pub fn verify(
        &self,
        authorization: &PaymentAuthorization,
        expected: &ExpectedTerms,
    ) -> VerificationResult {
        let payload = &authorization.payload;

        if let Err(err) = signing::verify_signature(
            &authorization.client_public_key,
            &authorization.signature,
            payload,
        ) {
            tracing::debug!(nonce = %payload.nonce, error = %err, "Signature check failed");
            return VerificationResult::invalid("signature verification failed");
        }

        match self.registry.register_if_absent(
            &payload.nonce,
            &authorization.client_public_key,
            &payload.resource_id,
        ) {
            NonceState::Active => {}
            NonceState::Used => {
                tracing::debug!(nonce = %payload.nonce, "Replay attempt on used nonce");
                return VerificationResult::invalid("nonce already used");
            }
            NonceState::Expired => {
                return VerificationResult::invalid("nonce expired");
            }
        }

        let expected_amount = expected.amount.as_deref().unwrap_or(&payload.amount);
        if payload.amount != expected_amount {
            return VerificationResult::invalid(format!(
                "amount mismatch: expected {expected_amount}, got {}",
                payload.amount
            ));
        }
        if let Some(asset) = &expected.asset {
            if self.asset.as_deref().is_some_and(|own| own != asset) {
                return VerificationResult::invalid(format!("asset mismatch: {asset}"));
            }
        }
        if let Some(network) = &expected.network {
            if *network != self.network {
                return VerificationResult::invalid(format!("network mismatch: {network}"));
            }
        }

        let now = UnixMillis::now();
        if now.is_before(payload.timestamp) || payload.expiry.is_before(now) {
            return VerificationResult::invalid("authorization expired");
        }

        VerificationResult::valid()
    }
}
