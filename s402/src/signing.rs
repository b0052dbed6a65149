//! Canonical signing message construction and ed25519 signature helpers.
//!
//! A client authorizes a payment by signing a structured message over the
//! authorization payload: a fixed domain descriptor, a typed field list, and
//! the payload itself, serialized as JSON with a fixed field order. Both
//! signer and verifier build the exact same bytes, so any change to a signed
//! field invalidates the detached signature.
//!
//! Signatures and public keys travel base58-encoded, matching the
//! Solana-flavoured key material the protocol was designed around.

use ed25519_dalek::{Signature, Signer, Verifier, VerifyingKey};
use serde::Serialize;

use crate::proto::AuthorizationPayload;

pub use ed25519_dalek::SigningKey;

/// Protocol name in the signing domain descriptor.
pub const DOMAIN_NAME: &str = "x402-solana-protocol";
/// Protocol version in the signing domain descriptor.
pub const DOMAIN_VERSION: &str = "1";
/// Chain identifier in the signing domain descriptor.
pub const DOMAIN_CHAIN_ID: &str = "devnet";
/// Verifying-contract tag in the signing domain descriptor.
pub const DOMAIN_VERIFYING_CONTRACT: &str = "x402-sol";

/// Primary type name of the signed message.
const PRIMARY_TYPE: &str = "AuthorizationPayload";

/// Errors from signing or verifying an authorization.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// The client public key is not valid base58 ed25519 key material.
    #[error("invalid public key encoding")]
    InvalidPublicKey,

    /// The signature is not a valid base58 64-byte signature.
    #[error("invalid signature encoding")]
    InvalidSignatureEncoding,

    /// The signature does not verify against the public key and message.
    #[error("signature verification failed")]
    VerificationFailed,

    /// The signing message could not be serialized.
    #[error("failed to serialize signing message: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Domain {
    name: &'static str,
    version: &'static str,
    chain_id: &'static str,
    verifying_contract: &'static str,
}

#[derive(Serialize)]
struct FieldType {
    name: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct Types {
    #[serde(rename = "AuthorizationPayload")]
    authorization_payload: [FieldType; 7],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SigningMessage<'a> {
    domain: Domain,
    types: Types,
    primary_type: &'static str,
    message: &'a AuthorizationPayload,
}

/// Builds the canonical byte sequence that is signed for `payload`.
///
/// The structure and field order are fixed; both the client signer and the
/// facilitator verifier must produce identical bytes.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if serialization fails (practically
/// impossible for well-formed payloads).
pub fn canonical_message(payload: &AuthorizationPayload) -> Result<Vec<u8>, serde_json::Error> {
    let message = SigningMessage {
        domain: Domain {
            name: DOMAIN_NAME,
            version: DOMAIN_VERSION,
            chain_id: DOMAIN_CHAIN_ID,
            verifying_contract: DOMAIN_VERIFYING_CONTRACT,
        },
        types: Types {
            authorization_payload: [
                FieldType { name: "amount", kind: "string" },
                FieldType { name: "recipient", kind: "string" },
                FieldType { name: "resourceId", kind: "string" },
                FieldType { name: "resourceUrl", kind: "string" },
                FieldType { name: "nonce", kind: "string" },
                FieldType { name: "timestamp", kind: "uint64" },
                FieldType { name: "expiry", kind: "uint64" },
            ],
        },
        primary_type: PRIMARY_TYPE,
        message: payload,
    };
    serde_json::to_vec(&message)
}

/// Signs `payload` with `signing_key`, returning the base58 detached signature.
///
/// This is the client-side half of the protocol; the facilitator never signs.
///
/// # Errors
///
/// Returns [`SignatureError::Serialization`] if the canonical message cannot
/// be built.
pub fn sign_payload(
    signing_key: &SigningKey,
    payload: &AuthorizationPayload,
) -> Result<String, SignatureError> {
    let message = canonical_message(payload)?;
    let signature = signing_key.sign(&message);
    Ok(bs58::encode(signature.to_bytes()).into_string())
}

/// Returns the base58 public key for a signing key.
#[must_use]
pub fn public_key_string(signing_key: &SigningKey) -> String {
    bs58::encode(signing_key.verifying_key().to_bytes()).into_string()
}

/// Verifies a base58 detached signature over the canonical message for
/// `payload` against a base58 public key.
///
/// # Errors
///
/// Returns [`SignatureError`] if the key or signature cannot be decoded or
/// the signature does not verify.
pub fn verify_signature(
    client_public_key: &str,
    signature: &str,
    payload: &AuthorizationPayload,
) -> Result<(), SignatureError> {
    let key_bytes: [u8; 32] = bs58::decode(client_public_key)
        .into_vec()
        .map_err(|_| SignatureError::InvalidPublicKey)?
        .try_into()
        .map_err(|_| SignatureError::InvalidPublicKey)?;
    let verifying_key =
        VerifyingKey::from_bytes(&key_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;

    let signature_bytes = bs58::decode(signature)
        .into_vec()
        .map_err(|_| SignatureError::InvalidSignatureEncoding)?;
    let signature = Signature::from_slice(&signature_bytes)
        .map_err(|_| SignatureError::InvalidSignatureEncoding)?;

    let message = canonical_message(payload)?;
    verifying_key
        .verify(&message, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}
