//! Tower layer plumbing for the payment gate.
//!
//! [`PaymentGateLayer`] wraps a protected route's service with a
//! [`PaymentGateService`]; per request, the service hands off to a
//! [`PaymentGate`](crate::server::gate::PaymentGate), which runs the payment
//! state machine before the inner service sees the request.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum_core::extract::Request;
use axum_core::response::Response;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};

use crate::client::FacilitatorClient;
use crate::server::config::RouteConfig;
use crate::server::gate::PaymentGate;

/// Layer that enforces payment on every request to the wrapped service.
///
/// Clone one layer per protected route; the facilitator client is shared.
#[derive(Debug, Clone)]
pub struct PaymentGateLayer {
    /// Client for the facilitator API.
    client: Arc<FacilitatorClient>,
    /// Payment terms of the protected route.
    route: Arc<RouteConfig>,
}

impl PaymentGateLayer {
    /// Creates a layer gating a route on the given terms.
    #[must_use]
    pub fn new(client: Arc<FacilitatorClient>, route: Arc<RouteConfig>) -> Self {
        Self { client, route }
    }

    /// Returns the route configuration this layer enforces.
    #[must_use]
    pub fn route(&self) -> &RouteConfig {
        &self.route
    }
}

impl<S> Layer<S> for PaymentGateLayer
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Service = PaymentGateService;

    fn layer(&self, inner: S) -> Self::Service {
        PaymentGateService {
            client: Arc::clone(&self.client),
            route: Arc::clone(&self.route),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// Service produced by [`PaymentGateLayer`].
#[derive(Clone)]
#[allow(missing_debug_implementations)] // BoxCloneSyncService does not implement Debug
pub struct PaymentGateService {
    /// Client for the facilitator API.
    client: Arc<FacilitatorClient>,
    /// Payment terms of the protected route.
    route: Arc<RouteConfig>,
    /// The wrapped service.
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl Service<Request> for PaymentGateService {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    /// Delegates readiness polling to the wrapped inner service.
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    /// Runs the payment state machine, then forwards to the wrapped service.
    fn call(&mut self, req: Request) -> Self::Future {
        let gate = PaymentGate {
            client: Arc::clone(&self.client),
            route: Arc::clone(&self.route),
        };
        let inner = self.inner.clone();
        Box::pin(async move { gate.handle(inner, req).await })
    }
}
