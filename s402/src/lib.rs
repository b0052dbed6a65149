#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the s402 pay-per-request payment protocol.
//!
//! This crate provides the foundational types shared by the resource-server
//! middleware and the facilitator service that together implement an HTTP 402
//! Payment Required flow. It contains no I/O.
//!
//! # Overview
//!
//! A resource server challenges an unpaid request with a [`proto::PaymentOffer`]
//! carried in a 402 response. The client signs an
//! [`proto::AuthorizationPayload`] committing to the offered terms and retries
//! with the resulting [`proto::PaymentAuthorization`] in the `X-PAYMENT`
//! header. A trusted facilitator verifies the authorization (signature,
//! replay nonce, terms, validity window) and settles the underlying transfer
//! before the protected operation runs.
//!
//! # Modules
//!
//! - [`proto`] - Wire format types exchanged between client, resource server, and facilitator
//! - [`signing`] - Canonical signing message construction and ed25519 signature helpers
//! - [`timestamp`] - Millisecond Unix timestamps used for authorization windows

pub mod proto;
pub mod signing;
pub mod timestamp;

pub use proto::{
    AuthorizationPayload, NonceRecord, NonceState, NonceStats, PaymentAuthorization, PaymentOffer,
    SettlementResult, SettlementStatus, VerificationResult,
};
pub use timestamp::UnixMillis;
