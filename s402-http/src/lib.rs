#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP layer for the s402 payment protocol.
//!
//! This crate is the resource-server half of the protocol:
//!
//! - [`server`] - tower/axum middleware that challenges unpaid requests with
//!   402 offers, mediates verify/settle calls to the facilitator, and hands a
//!   typed verified-payment context to the protected handler
//! - [`client`] - HTTP client for the facilitator API with per-call timeouts
//! - [`retry`] - bounded retry with increasing backoff for transient
//!   facilitator failures
//!
//! # Example
//!
//! ```ignore
//! use s402_http::client::{FacilitatorClient, FacilitatorOptions};
//! use s402_http::server::{ConfigValue, PaymentGateLayer, RouteConfig};
//!
//! let client = FacilitatorClient::try_new(FacilitatorOptions::default())?;
//! let route = RouteConfig::new(
//!     ConfigValue::Static("1000000".into()),
//!     ConfigValue::Static("MERCHANT_WALLET".into()),
//!     "USDC",
//!     "solana-devnet",
//! );
//! let app = axum::Router::new()
//!     .route("/api/procure", axum::routing::post(procure))
//!     .layer(PaymentGateLayer::new(client.into(), route.into()));
//! ```

pub mod client;
pub mod retry;
pub mod server;
