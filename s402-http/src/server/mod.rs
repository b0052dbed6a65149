//! Tower/axum middleware enforcing s402 payments on protected routes.
//!
//! The middleware sits in front of a protected operation and drives the
//! per-request payment state machine: a request without the `X-PAYMENT`
//! header is challenged with a 402 offer; a request carrying a payment
//! authorization is verified and settled through the facilitator before the
//! protected handler runs, with the settlement outcome handed to it as a
//! typed [`VerifiedPayment`] request extension.
//!
//! Route terms are configured per layer via [`RouteConfig`]. The `amount` and
//! `payTo` terms may be [`ConfigValue::Static`] or resolved per request from
//! a [`PricingContext`] extension established by an upstream collaborator
//! (e.g. a pricing step).
//!
//! See the crate root for a wiring example.

pub mod config;
pub mod context;
pub mod error;
pub mod gate;
pub mod layer;

pub use config::{ConfigValue, RouteConfig};
pub use context::{CorrelationId, PricingContext, VerifiedPayment};
pub use error::PaymentGateError;
pub use layer::{PaymentGateLayer, PaymentGateService};
