//! s402 facilitator HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Run with defaults (port 3001, simulated transfers)
//! cargo run -p s402-facilitator --release
//!
//! # Configure logging level
//! RUST_LOG=debug cargo run -p s402-facilitator
//! ```
//!
//! # Environment Variables
//!
//! - `HOST` / `PORT` — bind address (default: `0.0.0.0:3001`)
//! - `FACILITATOR_ADDRESS` — payment address reported by `/health`
//! - `NETWORK` / `ASSET` — settlement network and pinned asset
//! - `NONCE_TTL_MS` / `USED_NONCE_RETENTION_MS` / `CLEANUP_INTERVAL_MS` —
//!   nonce lifecycle tuning
//! - `REQUEST_BODY_LIMIT` — maximum request body size in bytes
//! - `SIMULATE_TRANSACTIONS` — fabricate transfers instead of submitting them
//! - `RUST_LOG` — log level filter (default: `info`)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use clap::Parser;
use tower_http::cors;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use s402_facilitator::config::FacilitatorConfig;
use s402_facilitator::handlers::{FacilitatorState, facilitator_router};
use s402_facilitator::registry::NonceRegistry;
use s402_facilitator::settle::{SettlementExecutor, SimulatedTransfers, TransferNetwork};
use s402_facilitator::sweep::NonceSweeper;
use s402_facilitator::util::SigDown;
use s402_facilitator::verify::AuthorizationVerifier;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Facilitator failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = FacilitatorConfig::parse();
    tracing::info!(
        host = %config.host,
        port = config.port,
        network = %config.network,
        simulate = config.simulate_transactions,
        "Loaded configuration"
    );

    let registry = Arc::new(NonceRegistry::new(
        config.nonce_ttl_ms,
        config.used_nonce_retention_ms,
    ));
    let sweeper = NonceSweeper::spawn(
        Arc::clone(&registry),
        Duration::from_millis(config.cleanup_interval_ms),
    );

    let network: Arc<dyn TransferNetwork> = if config.simulate_transactions {
        Arc::new(SimulatedTransfers)
    } else {
        // A real transfer backend is deployment-specific and wired in here.
        tracing::warn!("No live transfer backend configured; falling back to simulation");
        Arc::new(SimulatedTransfers)
    };

    let verifier = AuthorizationVerifier::new(
        Arc::clone(&registry),
        config.network.clone(),
        config.asset.clone(),
    );
    let executor = SettlementExecutor::new(Arc::clone(&registry), verifier.clone(), network);

    let state = Arc::new(FacilitatorState {
        verifier,
        executor,
        registry,
        address: config.facilitator_address.clone(),
    });

    let app = facilitator_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.request_body_limit))
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers(cors::Any),
        );

    let sig_down = SigDown::try_new()?;
    let shutdown = sig_down.cancellation_token();

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Facilitator listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    sweeper.shutdown().await;
    tracing::info!("Facilitator shut down gracefully");
    Ok(())
}
