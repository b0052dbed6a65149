//! The per-request payment state machine.
//!
//! [`PaymentGate`] drives one request through the protocol: challenge when
//! the payment header is absent, otherwise parse, verify, settle, and only
//! then invoke the protected operation with a [`VerifiedPayment`] attached.
//! Every failure path terminates the request with a structured JSON error;
//! the gate never surfaces a facilitator fault as anything but a response.

use std::convert::Infallible;
use std::sync::Arc;

use axum_core::body::Body;
use axum_core::extract::Request;
use axum_core::response::{IntoResponse, Response};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use rand::Rng;
use tower::Service;
use tower::util::BoxCloneSyncService;

use s402::proto::{
    EXACT_SCHEME, PaymentAuthorization, PaymentOffer, PaymentRequired, VerifyRequest,
};

use crate::client::FacilitatorClient;
use crate::server::config::RouteConfig;
use crate::server::context::{CorrelationId, PricingContext, VerifiedPayment};
use crate::server::error::PaymentGateError;

/// The payment header name.
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// The inner service wrapped by the gate.
pub(crate) type InnerService = BoxCloneSyncService<Request, Response, Infallible>;

/// Payment gate for one protected route.
///
/// Constructed per request by the [`layer`](crate::server::layer) plumbing;
/// holds the route terms and the facilitator client shared across requests.
#[allow(missing_debug_implementations)]
pub struct PaymentGate {
    /// Client for the facilitator's verify/settle endpoints.
    pub(crate) client: Arc<FacilitatorClient>,
    /// Payment terms of the protected route.
    pub(crate) route: Arc<RouteConfig>,
}

impl PaymentGate {
    /// Runs the state machine for one request.
    ///
    /// # Errors
    ///
    /// Infallible: every failure becomes a structured error response.
    pub(crate) async fn handle(
        self,
        mut inner: InnerService,
        mut req: Request,
    ) -> Result<Response, Infallible> {
        // Resolve dynamic terms before challenging or verifying, so the
        // offer and the expected amount always agree for this request.
        let pricing = req.extensions().get::<PricingContext>().cloned();
        let amount = self.route.effective_amount(pricing.as_ref()).to_owned();
        let pay_to = self.route.effective_pay_to(pricing.as_ref()).to_owned();

        let Some(header) = req.headers().get(PAYMENT_HEADER) else {
            return Ok(self.challenge(&req, amount, pay_to));
        };

        let authorization = match parse_authorization(header) {
            Ok(authorization) => authorization,
            Err(err) => return Ok(err.into_response()),
        };

        match self.verify_and_settle(&authorization, amount).await {
            Ok(payment) => {
                tracing::debug!(
                    nonce = %payment.nonce,
                    signature = %payment.transaction_signature,
                    "Payment settled; invoking protected handler"
                );
                req.extensions_mut().insert(payment);
                inner.call(req).await
            }
            Err(err) => {
                tracing::warn!(code = err.code(), error = %err, "Payment rejected");
                Ok(err.into_response())
            }
        }
    }

    /// Builds the 402 challenge response for a request without a payment.
    fn challenge(&self, req: &Request, amount: String, pay_to: String) -> Response {
        let request_id = req
            .extensions()
            .get::<CorrelationId>()
            .map_or_else(generate_request_id, |id| id.0.clone());
        let resource = req
            .uri()
            .path_and_query()
            .map_or_else(|| req.uri().path().to_owned(), |pq| pq.as_str().to_owned());

        let body = PaymentRequired {
            request_id,
            accepts: vec![PaymentOffer {
                scheme: EXACT_SCHEME.to_owned(),
                network: self.route.network.clone(),
                max_amount_required: amount,
                asset: self.route.asset.clone(),
                pay_to,
                resource,
            }],
            error: "Payment Required".to_owned(),
            message: "The X-PAYMENT header is missing or empty.".to_owned(),
        };
        json_response(
            StatusCode::PAYMENT_REQUIRED,
            serde_json::to_string(&body).expect("challenge serialization cannot fail"),
        )
    }

    /// Verifies and settles an authorization through the facilitator.
    async fn verify_and_settle(
        &self,
        authorization: &PaymentAuthorization,
        amount: String,
    ) -> Result<VerifiedPayment, PaymentGateError> {
        let request = VerifyRequest::new(
            authorization,
            Some(amount),
            Some(self.route.asset.clone()),
            Some(self.route.network.clone()),
        )
        .map_err(|e| PaymentGateError::Processing(e.to_string()))?;

        let verification = self
            .client
            .verify(&request)
            .await
            .map_err(|e| PaymentGateError::Processing(e.to_string()))?;
        if !verification.is_valid {
            return Err(PaymentGateError::VerificationFailed(
                verification
                    .error
                    .unwrap_or_else(|| "authorization rejected".to_owned()),
            ));
        }

        let settlement = self
            .client
            .settle(&request)
            .await
            .map_err(|e| PaymentGateError::Processing(e.to_string()))?;
        if !settlement.is_settled() {
            return Err(PaymentGateError::SettlementFailed(
                settlement
                    .error
                    .unwrap_or_else(|| "transfer not settled".to_owned()),
            ));
        }

        let payload = &authorization.payload;
        Ok(VerifiedPayment {
            verified: true,
            nonce: payload.nonce.clone(),
            amount: payload.amount.clone(),
            recipient: payload.recipient.clone(),
            resource_id: payload.resource_id.clone(),
            transaction_signature: settlement.transaction_signature.unwrap_or_default(),
        })
    }
}

/// Parses the payment header as an authorization.
fn parse_authorization(header: &HeaderValue) -> Result<PaymentAuthorization, PaymentGateError> {
    let text = header.to_str().map_err(|_| {
        tracing::debug!("Rejecting payment header with non-UTF-8 bytes");
        PaymentGateError::MalformedAuthorization
    })?;
    serde_json::from_str(text).map_err(|err| {
        tracing::debug!(error = %err, "Rejecting unparseable payment header");
        PaymentGateError::MalformedAuthorization
    })
}

/// Generates a fresh correlation identifier for a challenge.
fn generate_request_id() -> String {
    let mut rng = rand::rng();
    (0..16)
        .map(|_| char::from(rng.sample(rand::distr::Alphanumeric)))
        .collect()
}

/// Builds a JSON response with the given status.
fn json_response(status: StatusCode, body: String) -> Response {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("response construction cannot fail")
}
