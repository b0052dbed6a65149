//! End-to-end exercise of the payment protocol: a real facilitator and a
//! gated resource server on local TCP sockets, driven by a signing client.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use s402::proto::{AuthorizationPayload, NonceState, PaymentAuthorization, VerifyRequest};
use s402::signing::{self, SigningKey};
use s402::timestamp::UnixMillis;
use s402_facilitator::handlers::{FacilitatorState, facilitator_router};
use s402_facilitator::registry::NonceRegistry;
use s402_facilitator::settle::{SettlementExecutor, SimulatedTransfers};
use s402_facilitator::verify::AuthorizationVerifier;
use s402_http::client::{FacilitatorClient, FacilitatorOptions};
use s402_http::retry::RetryPolicy;
use s402_http::server::{ConfigValue, PaymentGateLayer, PricingContext, RouteConfig, VerifiedPayment};

const FIFTEEN_MINUTES_MS: u64 = 15 * 60 * 1000;

/// Spawns a facilitator on an ephemeral port; returns its base URL.
async fn spawn_facilitator(nonce_ttl_ms: u64) -> String {
    let registry = Arc::new(NonceRegistry::new(nonce_ttl_ms, 60 * 60 * 1000));
    let verifier = AuthorizationVerifier::new(
        Arc::clone(&registry),
        "solana-devnet".to_owned(),
        Some("USDC".to_owned()),
    );
    let executor = SettlementExecutor::new(
        Arc::clone(&registry),
        verifier.clone(),
        Arc::new(SimulatedTransfers),
    );
    let state = Arc::new(FacilitatorState {
        verifier,
        executor,
        registry,
        address: "FACILITATOR".to_owned(),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, facilitator_router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

fn facilitator_client(base_url: &str) -> Arc<FacilitatorClient> {
    Arc::new(
        FacilitatorClient::try_new(FacilitatorOptions {
            base_url: base_url.to_owned(),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                attempts: 2,
                base_delay: Duration::from_millis(50),
            },
        })
        .unwrap(),
    )
}

fn procure_route() -> RouteConfig {
    RouteConfig::new(
        ConfigValue::Static("1000000".to_owned()),
        ConfigValue::Static("W".to_owned()),
        "USDC",
        "solana-devnet",
    )
}

/// Spawns a resource server gating `POST /api/procure`; returns its base URL.
async fn spawn_resource_server(
    facilitator_url: &str,
    route: RouteConfig,
    hits: Arc<AtomicU32>,
    pricing: Option<PricingContext>,
) -> String {
    let layer = PaymentGateLayer::new(facilitator_client(facilitator_url), Arc::new(route));

    let handler_hits = Arc::clone(&hits);
    let mut app = Router::new()
        .route(
            "/api/procure",
            post(move |payment: VerifiedPayment| {
                let hits = Arc::clone(&handler_hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({
                        "nonce": payment.nonce,
                        "amount": payment.amount,
                        "recipient": payment.recipient,
                        "transactionSignature": payment.transaction_signature,
                    }))
                }
            }),
        )
        .layer(layer);

    // Simulates the upstream pricing collaborator, when configured.
    if let Some(pricing) = pricing {
        app = app.layer(middleware::from_fn(
            move |mut req: Request, next: Next| {
                let pricing = pricing.clone();
                async move {
                    req.extensions_mut().insert(pricing);
                    let response: Response = next.run(req).await;
                    response
                }
            },
        ));
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn signed_authorization(key: &SigningKey, nonce: &str, amount: &str) -> PaymentAuthorization {
    let now = UnixMillis::now();
    let payload = AuthorizationPayload {
        amount: amount.to_owned(),
        recipient: "W".to_owned(),
        resource_id: "/api/procure".to_owned(),
        resource_url: "/api/procure".to_owned(),
        nonce: nonce.to_owned(),
        timestamp: now,
        expiry: now + FIFTEEN_MINUTES_MS,
    };
    let signature = signing::sign_payload(key, &payload).unwrap();
    PaymentAuthorization {
        payload,
        signature,
        client_public_key: signing::public_key_string(key),
    }
}

#[tokio::test]
async fn missing_header_yields_the_expected_challenge() {
    let facilitator = spawn_facilitator(FIFTEEN_MINUTES_MS).await;
    let server =
        spawn_resource_server(&facilitator, procure_route(), Arc::new(AtomicU32::new(0)), None)
            .await;

    let response = reqwest::Client::new()
        .post(format!("{server}/api/procure"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::PAYMENT_REQUIRED);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Payment Required");
    assert!(!body["request_id"].as_str().unwrap().is_empty());
    assert_eq!(
        body["accepts"][0],
        json!({
            "scheme": "exact",
            "network": "solana-devnet",
            "maxAmountRequired": "1000000",
            "asset": "USDC",
            "payTo": "W",
            "resource": "/api/procure",
        })
    );
}

#[tokio::test]
async fn signed_authorization_settles_and_runs_the_handler_once() {
    let facilitator = spawn_facilitator(FIFTEEN_MINUTES_MS).await;
    let hits = Arc::new(AtomicU32::new(0));
    let server =
        spawn_resource_server(&facilitator, procure_route(), Arc::clone(&hits), None).await;

    let key = SigningKey::from_bytes(&[11u8; 32]);
    let authorization = signed_authorization(&key, "e2e-settle-1", "1000000");
    let header = serde_json::to_string(&authorization).unwrap();

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{server}/api/procure"))
        .header("X-PAYMENT", &header)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["nonce"], "e2e-settle-1");
    assert_eq!(body["amount"], "1000000");
    assert!(!body["transactionSignature"].as_str().unwrap().is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Replaying the same authorization is rejected at verification.
    let replay = client
        .post(format!("{server}/api/procure"))
        .header("X-PAYMENT", &header)
        .send()
        .await
        .unwrap();
    assert_eq!(replay.status(), reqwest::StatusCode::PAYMENT_REQUIRED);
    let body: Value = replay.json().await.unwrap();
    assert_eq!(body["code"], "PAYMENT_VERIFICATION_FAILED");
    assert_eq!(body["message"], "nonce already used");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unparseable_header_is_rejected_as_invalid_format() {
    let facilitator = spawn_facilitator(FIFTEEN_MINUTES_MS).await;
    let hits = Arc::new(AtomicU32::new(0));
    let server =
        spawn_resource_server(&facilitator, procure_route(), Arc::clone(&hits), None).await;

    let response = reqwest::Client::new()
        .post(format!("{server}/api/procure"))
        .header("X-PAYMENT", "not json at all")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_PAYMENT_FORMAT");
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn amount_below_the_route_price_fails_verification() {
    let facilitator = spawn_facilitator(FIFTEEN_MINUTES_MS).await;
    let hits = Arc::new(AtomicU32::new(0));
    let server =
        spawn_resource_server(&facilitator, procure_route(), Arc::clone(&hits), None).await;

    let key = SigningKey::from_bytes(&[12u8; 32]);
    let authorization = signed_authorization(&key, "e2e-cheap-1", "999");
    let response = reqwest::Client::new()
        .post(format!("{server}/api/procure"))
        .header("X-PAYMENT", serde_json::to_string(&authorization).unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::PAYMENT_REQUIRED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "PAYMENT_VERIFICATION_FAILED");
    assert!(body["message"].as_str().unwrap().starts_with("amount mismatch"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn pricing_context_overrides_the_offered_amount() {
    let facilitator = spawn_facilitator(FIFTEEN_MINUTES_MS).await;
    let route = RouteConfig::new(
        ConfigValue::FromContext {
            fallback: "1000000".to_owned(),
        },
        ConfigValue::Static("W".to_owned()),
        "USDC",
        "solana-devnet",
    );
    let pricing = PricingContext {
        amount: Some("250000".to_owned()),
        pay_to: None,
    };
    let server = spawn_resource_server(
        &facilitator,
        route,
        Arc::new(AtomicU32::new(0)),
        Some(pricing),
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("{server}/api/procure"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["accepts"][0]["maxAmountRequired"], "250000");
}

#[tokio::test]
async fn dynamic_route_falls_back_without_pricing_context() {
    let facilitator = spawn_facilitator(FIFTEEN_MINUTES_MS).await;
    let route = RouteConfig::new(
        ConfigValue::FromContext {
            fallback: "1000000".to_owned(),
        },
        ConfigValue::Static("W".to_owned()),
        "USDC",
        "solana-devnet",
    );
    let server =
        spawn_resource_server(&facilitator, route, Arc::new(AtomicU32::new(0)), None).await;

    let response = reqwest::Client::new()
        .post(format!("{server}/api/procure"))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["accepts"][0]["maxAmountRequired"], "1000000");
}

#[tokio::test]
async fn observational_endpoints_track_the_nonce_lifecycle() {
    let facilitator = spawn_facilitator(FIFTEEN_MINUTES_MS).await;
    let client = facilitator_client(&facilitator);

    let health = client.health().await.unwrap();
    assert_eq!(health.facilitator, "FACILITATOR");

    // A verify registers the nonce without consuming it.
    let key = SigningKey::from_bytes(&[13u8; 32]);
    let authorization = signed_authorization(&key, "e2e-observe-1", "1000000");
    let request = VerifyRequest::new(&authorization, None, None, None).unwrap();
    assert!(client.verify(&request).await.unwrap().is_valid);

    let record = client.nonce("e2e-observe-1").await.unwrap().unwrap();
    assert_eq!(record.state, NonceState::Active);
    assert_eq!(record.owner, authorization.client_public_key);
    assert!(client.nonce("never-seen").await.unwrap().is_none());

    let stats = client.stats().await.unwrap();
    assert_eq!(stats.active_nonces, 1);

    // Settling consumes it.
    assert!(client.settle(&request).await.unwrap().is_settled());
    let record = client.nonce("e2e-observe-1").await.unwrap().unwrap();
    assert_eq!(record.state, NonceState::Used);
    assert_eq!(client.stats().await.unwrap().used_nonces, 1);
}

#[tokio::test]
async fn cleanup_sweeps_an_expired_registration() {
    let facilitator = spawn_facilitator(50).await;
    let client = facilitator_client(&facilitator);

    let key = SigningKey::from_bytes(&[14u8; 32]);
    let authorization = signed_authorization(&key, "e2e-sweep-1", "1000000");
    let request = VerifyRequest::new(&authorization, None, None, None).unwrap();
    assert!(client.verify(&request).await.unwrap().is_valid);
    assert_eq!(client.stats().await.unwrap().active_nonces, 1);

    tokio::time::sleep(Duration::from_millis(120)).await;

    assert_eq!(client.cleanup().await.unwrap(), 1);
    let stats = client.stats().await.unwrap();
    assert_eq!(stats.active_nonces, 0);
    assert_eq!(stats.total_nonces, 0);
    assert!(client.nonce("e2e-sweep-1").await.unwrap().is_none());
}
