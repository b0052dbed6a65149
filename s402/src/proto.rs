//! Wire format types for the s402 payment protocol.
//!
//! These are the JSON shapes exchanged between the three parties:
//!
//! - [`PaymentOffer`] - carried in a 402 challenge from the resource server
//! - [`PaymentAuthorization`] - the client's signed commitment, sent in the
//!   `X-PAYMENT` header and forwarded to the facilitator
//! - [`VerifyRequest`] - the facilitator `/verify` and `/settle` request body
//! - [`VerificationResult`] / [`SettlementResult`] - facilitator responses
//! - [`NonceRecord`] / [`NonceStats`] - replay-protection bookkeeping exposed
//!   by the facilitator's observational endpoints
//!
//! Field names are camelCase on the wire, except the 402 challenge body's
//! `request_id` which predates that convention.

use serde::{Deserialize, Serialize};

use crate::timestamp::UnixMillis;

/// The only payment scheme defined by this protocol.
pub const EXACT_SCHEME: &str = "exact";

/// Payment terms offered by a resource server in a 402 challenge.
///
/// Produced fresh for every challenge, immutable, and never persisted beyond
/// the response that carries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOffer {
    /// Payment scheme identifier (always [`EXACT_SCHEME`]).
    pub scheme: String,
    /// Network the payment must settle on (e.g., `"solana-devnet"`).
    pub network: String,
    /// Maximum amount the client may be charged, in base units.
    pub max_amount_required: String,
    /// Asset identifier (e.g., a token mint address or symbol).
    pub asset: String,
    /// Recipient address for the payment.
    pub pay_to: String,
    /// The protected resource this offer grants access to.
    pub resource: String,
}

/// The signed portion of a payment authorization.
///
/// Constructed and signed by the client; the resource server and facilitator
/// only ever read it. `timestamp` and `expiry` bound the validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationPayload {
    /// Amount the client commits to pay, in base units.
    pub amount: String,
    /// Recipient address the client commits to pay.
    pub recipient: String,
    /// Identifier of the resource being paid for.
    pub resource_id: String,
    /// Full URL of the resource being paid for.
    pub resource_url: String,
    /// Single-use replay-protection token chosen by the client.
    pub nonce: String,
    /// When the authorization was created.
    pub timestamp: UnixMillis,
    /// When the authorization ceases to be valid.
    pub expiry: UnixMillis,
}

/// A client-signed payment authorization.
///
/// `signature` is a base58 detached ed25519 signature over the canonical
/// signing message for `payload` (see [`crate::signing`]); `client_public_key`
/// is the base58 ed25519 public key it verifies against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAuthorization {
    /// The signed payload.
    pub payload: AuthorizationPayload,
    /// Base58 detached signature over the canonical signing message.
    pub signature: String,
    /// Base58 public key of the signer.
    pub client_public_key: String,
}

/// Request body for the facilitator `/verify` and `/settle` endpoints.
///
/// `payment_request` carries the [`PaymentAuthorization`] as a nested JSON
/// string (the historical wire format). `expected_amount` is the amount the
/// resource server expects; when absent the facilitator falls back to the
/// authorization's own claimed amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Serialized [`PaymentAuthorization`] JSON.
    pub payment_request: String,
    /// Amount the resource server expects, in base units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_amount: Option<String>,
    /// Expected asset, if the resource server pins one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// Expected network, if the resource server pins one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

impl VerifyRequest {
    /// Builds a request from an authorization and the expected terms.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the authorization cannot be
    /// serialized (practically impossible for well-formed payloads).
    pub fn new(
        authorization: &PaymentAuthorization,
        expected_amount: Option<String>,
        asset: Option<String>,
        network: Option<String>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            payment_request: serde_json::to_string(authorization)?,
            expected_amount,
            asset,
            network,
        })
    }

    /// Parses the nested [`PaymentAuthorization`].
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if `payment_request` is not valid
    /// authorization JSON.
    pub fn authorization(&self) -> Result<PaymentAuthorization, serde_json::Error> {
        serde_json::from_str(&self.payment_request)
    }
}

/// Outcome of verifying a payment authorization.
///
/// This is the canonical wire schema; legacy producers that spell the truthy
/// field `valid` or `success` are decoded by a compatibility shim at the
/// client boundary, never here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    /// Whether the authorization passed every check.
    pub is_valid: bool,
    /// Why verification failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerificationResult {
    /// A passing result.
    #[must_use]
    pub const fn valid() -> Self {
        Self {
            is_valid: true,
            error: None,
        }
    }

    /// A failing result with a reason.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(reason.into()),
        }
    }
}

/// Terminal status of a settlement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    /// The transfer was executed and confirmed.
    Settled,
    /// The transfer was not (or may not have been) executed.
    Error,
}

/// Outcome of settling a verified authorization.
///
/// `transaction_signature` is the external ledger reference and the only part
/// of the exchange worth retaining past the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    /// Whether the transfer settled.
    pub status: SettlementStatus,
    /// Ledger reference for the executed transfer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_signature: Option<String>,
    /// Why settlement failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SettlementResult {
    /// A successful settlement carrying its ledger reference.
    #[must_use]
    pub fn settled(transaction_signature: impl Into<String>) -> Self {
        Self {
            status: SettlementStatus::Settled,
            transaction_signature: Some(transaction_signature.into()),
            error: None,
        }
    }

    /// A failed settlement with a diagnostic message.
    #[must_use]
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            status: SettlementStatus::Error,
            transaction_signature: None,
            error: Some(reason.into()),
        }
    }

    /// Whether the transfer settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.status == SettlementStatus::Settled
    }
}

/// Lifecycle state of a replay-protection nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NonceState {
    /// Registered and eligible for settlement.
    Active,
    /// Consumed by a settlement attempt; permanently unusable.
    Used,
    /// Past its expiry without ever being used.
    Expired,
}

/// A nonce as tracked by the facilitator's registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceRecord {
    /// The nonce value.
    pub nonce: String,
    /// Public key of the client that first presented the nonce.
    pub owner: String,
    /// Resource the nonce was presented for.
    pub resource: String,
    /// When the registry first saw the nonce.
    pub issued_at: UnixMillis,
    /// When the registry stops accepting the nonce.
    pub expires_at: UnixMillis,
    /// Current lifecycle state.
    pub state: NonceState,
}

/// Aggregate nonce counts reported by the facilitator `/stats` endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceStats {
    /// All records currently held.
    pub total_nonces: u64,
    /// Records consumed by settlement.
    pub used_nonces: u64,
    /// Records still eligible for settlement.
    pub active_nonces: u64,
    /// Records past expiry, pending sweep.
    pub expired_nonces: u64,
}

/// Body of a 402 Payment Required challenge from the resource server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequired {
    /// Correlation identifier, caller-supplied or generated per challenge.
    pub request_id: String,
    /// Payment terms the server accepts.
    pub accepts: Vec<PaymentOffer>,
    /// Always `"Payment Required"`.
    pub error: String,
    /// Human-readable explanation.
    pub message: String,
}

/// Generic success/failure envelope used by the facilitator's observational
/// endpoints (`/health`, `/stats`, `/cleanup-nonces`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
pub struct Envelope<T> {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Diagnostic message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    /// A success envelope wrapping `data`.
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A failure envelope with a message.
    #[must_use]
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Payload of the facilitator `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthData {
    /// The facilitator's payment address.
    pub facilitator: String,
    /// Server time when the check ran.
    pub timestamp: UnixMillis,
}

/// Payload of the facilitator `/cleanup-nonces` endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CleanupData {
    /// Number of records removed by the sweep.
    pub removed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> AuthorizationPayload {
        AuthorizationPayload {
            amount: "1000000".to_owned(),
            recipient: "W".to_owned(),
            resource_id: "/api/procure".to_owned(),
            resource_url: "/api/procure".to_owned(),
            nonce: "procure-1700000000000".to_owned(),
            timestamp: UnixMillis::from_millis(1_700_000_000_000),
            expiry: UnixMillis::from_millis(1_700_000_900_000),
        }
    }

    #[test]
    fn offer_uses_camel_case_wire_names() {
        let offer = PaymentOffer {
            scheme: EXACT_SCHEME.to_owned(),
            network: "solana-devnet".to_owned(),
            max_amount_required: "1000000".to_owned(),
            asset: "USDC".to_owned(),
            pay_to: "W".to_owned(),
            resource: "/api/procure".to_owned(),
        };
        let json = serde_json::to_value(&offer).unwrap();
        assert_eq!(json["maxAmountRequired"], "1000000");
        assert_eq!(json["payTo"], "W");
        assert_eq!(json["scheme"], "exact");
    }

    #[test]
    fn authorization_roundtrips_through_verify_request() {
        let authorization = PaymentAuthorization {
            payload: sample_payload(),
            signature: "sig".to_owned(),
            client_public_key: "pk".to_owned(),
        };
        let request =
            VerifyRequest::new(&authorization, Some("1000000".to_owned()), None, None).unwrap();
        let parsed = request.authorization().unwrap();
        assert_eq!(parsed, authorization);
    }

    #[test]
    fn payload_timestamps_serialize_as_numbers() {
        let json = serde_json::to_value(sample_payload()).unwrap();
        assert!(json["timestamp"].is_u64());
        assert!(json["expiry"].is_u64());
        assert_eq!(json["resourceId"], "/api/procure");
    }

    #[test]
    fn settlement_result_constructors() {
        let ok = SettlementResult::settled("abc");
        assert!(ok.is_settled());
        assert_eq!(ok.transaction_signature.as_deref(), Some("abc"));

        let err = SettlementResult::error("boom");
        assert!(!err.is_settled());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json.get("transactionSignature").is_none());
    }

    #[test]
    fn verification_result_omits_absent_error() {
        let json = serde_json::to_value(VerificationResult::valid()).unwrap();
        assert_eq!(json, serde_json::json!({"isValid": true}));
    }
}
