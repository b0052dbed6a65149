//! HTTP client for a remote s402 facilitator.
//!
//! [`FacilitatorClient`] covers the full facilitator API: the
//! transaction-critical `/verify` and `/settle` calls plus the observational
//! `/health`, `/stats`, `/nonce/{nonce}` and operational `/cleanup-nonces`
//! endpoints. Every call is bounded by a per-request timeout and wrapped in
//! the configured [`RetryPolicy`]; only transient transport failures are
//! retried.
//!
//! ## Error Handling
//!
//! [`FacilitatorClientError`] captures detailed failure contexts, including
//! - URL construction
//! - HTTP transport failures (the transient class)
//! - JSON deserialization errors
//! - Unexpected HTTP status responses
//!
//! A facilitator answer that decodes cleanly — `isValid: false`, `status:
//! "error"` — is not an error at this layer; it is a definite protocol
//! outcome returned to the caller as-is.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use url::Url;

use s402::proto::{
    CleanupData, Envelope, HealthData, NonceRecord, NonceStats, SettlementResult,
    VerificationResult, VerifyRequest,
};

use crate::retry::{RetryPolicy, TransientError};

/// Connection options for a [`FacilitatorClient`].
///
/// Defaults mirror the protocol's historical middleware: facilitator on
/// `http://localhost:3001`, a 30 second per-call timeout, and three attempts
/// with a one second backoff unit.
#[derive(Debug, Clone)]
pub struct FacilitatorOptions {
    /// Base URL of the facilitator (e.g. `http://localhost:3001`).
    pub base_url: String,
    /// Per-request timeout applied to every call.
    pub timeout: Duration,
    /// Retry policy for transient transport failures.
    pub retry: RetryPolicy,
}

impl Default for FacilitatorOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_owned(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Errors that can occur while interacting with a remote facilitator.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// HTTP transport error (timeout, connection failure).
    #[error("HTTP error: {context}: {source}")]
    Transport {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// JSON deserialization error.
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// Unexpected HTTP status code.
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        /// Human-readable context.
        context: &'static str,
        /// The HTTP status code.
        status: StatusCode,
        /// The response body.
        body: String,
    },
    /// Failed to read response body.
    #[error("Failed to read response body as text: {context}: {source}")]
    ResponseBodyRead {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// The facilitator answered with a failure envelope.
    #[error("Facilitator reported failure: {context}: {message}")]
    Rejected {
        /// Human-readable context.
        context: &'static str,
        /// The envelope's error message.
        message: String,
    },
}

impl TransientError for FacilitatorClientError {
    /// Timeouts and connection failures are worth retrying; everything else
    /// is a deterministic outcome that a retry cannot change.
    fn is_transient(&self) -> bool {
        match self {
            Self::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            Self::UrlParse { .. }
            | Self::JsonDeserialization { .. }
            | Self::HttpStatus { .. }
            | Self::ResponseBodyRead { .. }
            | Self::Rejected { .. } => false,
        }
    }
}

/// A client for a remote s402 facilitator.
#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    /// Base URL of the facilitator.
    base_url: Url,
    /// Full URL for `POST /verify` requests.
    verify_url: Url,
    /// Full URL for `POST /settle` requests.
    settle_url: Url,
    /// Full URL for `GET /health` requests.
    health_url: Url,
    /// Full URL for `GET /stats` requests.
    stats_url: Url,
    /// Full URL for `DELETE /cleanup-nonces` requests.
    cleanup_url: Url,
    /// Shared reqwest HTTP client.
    client: Client,
    /// Per-request timeout.
    timeout: Duration,
    /// Retry policy for transient failures.
    retry: RetryPolicy,
}

impl FacilitatorClient {
    /// Constructs a client from connection options.
    ///
    /// Endpoint URLs are computed once, relative to the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError::UrlParse`] if the base URL or any
    /// endpoint URL cannot be constructed.
    pub fn try_new(options: FacilitatorOptions) -> Result<Self, FacilitatorClientError> {
        // Normalize: strip trailing slashes and add a single trailing slash
        // so relative joins land under the base path.
        let mut normalized = options.base_url.trim_end_matches('/').to_owned();
        normalized.push('/');
        let base_url = Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;

        let join = |segment: &str, context: &'static str| {
            base_url
                .join(segment)
                .map_err(|e| FacilitatorClientError::UrlParse { context, source: e })
        };
        Ok(Self {
            verify_url: join("./verify", "Failed to construct ./verify URL")?,
            settle_url: join("./settle", "Failed to construct ./settle URL")?,
            health_url: join("./health", "Failed to construct ./health URL")?,
            stats_url: join("./stats", "Failed to construct ./stats URL")?,
            cleanup_url: join("./cleanup-nonces", "Failed to construct ./cleanup-nonces URL")?,
            base_url,
            client: Client::new(),
            timeout: options.timeout,
            retry: options.retry,
        })
    }

    /// Returns the base URL used by this client.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the retry policy.
    #[must_use]
    pub const fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Sends a `POST /verify` request.
    ///
    /// Legacy facilitators spell the truthy field `valid` or `success`
    /// instead of `isValid`; the response is decoded through a compatibility
    /// shim so callers only ever see the canonical [`VerificationResult`].
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the HTTP exchange fails after
    /// the configured retries.
    pub async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerificationResult, FacilitatorClientError> {
        let raw: Value = self
            .retry
            .run(|| self.post_json(&self.verify_url, "POST /verify", request))
            .await?;
        Ok(decode_verification(&raw))
    }

    /// Sends a `POST /settle` request.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the HTTP exchange fails after
    /// the configured retries. A settlement rejection (`status: "error"`) is
    /// a successful exchange and is returned as the [`SettlementResult`].
    pub async fn settle(
        &self,
        request: &VerifyRequest,
    ) -> Result<SettlementResult, FacilitatorClientError> {
        self.retry
            .run(|| self.post_json(&self.settle_url, "POST /settle", request))
            .await
    }

    /// Sends a `GET /health` request.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the HTTP exchange fails or the
    /// facilitator reports failure.
    pub async fn health(&self) -> Result<HealthData, FacilitatorClientError> {
        let envelope: Envelope<HealthData> = self
            .retry
            .run(|| self.get_json(&self.health_url, "GET /health"))
            .await?;
        unwrap_envelope(envelope, "GET /health")
    }

    /// Sends a `GET /stats` request.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the HTTP exchange fails or the
    /// facilitator reports failure.
    pub async fn stats(&self) -> Result<NonceStats, FacilitatorClientError> {
        let envelope: Envelope<NonceStats> = self
            .retry
            .run(|| self.get_json(&self.stats_url, "GET /stats"))
            .await?;
        unwrap_envelope(envelope, "GET /stats")
    }

    /// Sends a `GET /nonce/{nonce}` request.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the HTTP exchange fails. An
    /// unknown nonce is `Ok(None)`, not an error.
    pub async fn nonce(&self, nonce: &str) -> Result<Option<NonceRecord>, FacilitatorClientError> {
        let url = self.base_url.join(&format!("./nonce/{nonce}")).map_err(|e| {
            FacilitatorClientError::UrlParse {
                context: "Failed to construct ./nonce URL",
                source: e,
            }
        })?;
        match self.retry.run(|| self.get_json(&url, "GET /nonce")).await {
            Ok(record) => Ok(Some(record)),
            Err(FacilitatorClientError::HttpStatus { status, .. })
                if status == StatusCode::NOT_FOUND =>
            {
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Sends a `DELETE /cleanup-nonces` request, forcing an immediate sweep.
    ///
    /// Returns the number of records the sweep removed.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the HTTP exchange fails or the
    /// facilitator reports failure.
    pub async fn cleanup(&self) -> Result<u64, FacilitatorClientError> {
        let envelope: Envelope<CleanupData> = self
            .retry
            .run(|| self.request_json(self.client.delete(self.cleanup_url.clone()), "DELETE /cleanup-nonces"))
            .await?;
        unwrap_envelope(envelope, "DELETE /cleanup-nonces").map(|data| data.removed)
    }

    /// Generic POST helper handling JSON serialization, timeout application,
    /// and error mapping.
    ///
    /// `context` is a human-readable identifier used in tracing and error
    /// messages (e.g. `"POST /verify"`).
    async fn post_json<T, R>(
        &self,
        url: &Url,
        context: &'static str,
        payload: &T,
    ) -> Result<R, FacilitatorClientError>
    where
        T: serde::Serialize + Sync + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        self.request_json(self.client.post(url.clone()).json(payload), context)
            .await
    }

    /// Generic GET helper.
    async fn get_json<R>(&self, url: &Url, context: &'static str) -> Result<R, FacilitatorClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        self.request_json(self.client.get(url.clone()), context).await
    }

    /// Applies the timeout, sends the request, and decodes a 200 response.
    async fn request_json<R>(
        &self,
        request: reqwest::RequestBuilder,
        context: &'static str,
    ) -> Result<R, FacilitatorClientError>
    where
        R: serde::de::DeserializeOwned,
    {
        let http_response = request
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FacilitatorClientError::Transport { context, source: e })?;

        if http_response.status() == StatusCode::OK {
            http_response
                .json::<R>()
                .await
                .map_err(|e| FacilitatorClientError::JsonDeserialization { context, source: e })
        } else {
            let status = http_response.status();
            let body = http_response
                .text()
                .await
                .map_err(|e| FacilitatorClientError::ResponseBodyRead { context, source: e })?;
            tracing::warn!(%status, context, "Facilitator returned unexpected status");
            Err(FacilitatorClientError::HttpStatus {
                context,
                status,
                body,
            })
        }
    }
}

/// Converts a string URL into a [`FacilitatorClient`] with default timeout
/// and retry settings.
impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_new(FacilitatorOptions {
            base_url: value.to_owned(),
            ..FacilitatorOptions::default()
        })
    }
}

/// Converts a String URL into a [`FacilitatorClient`].
impl TryFrom<String> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

/// Decodes a verify response, accepting the legacy truthy field spellings.
///
/// The canonical schema is `{isValid, error?}`; older facilitators answered
/// `{valid}` or `{success}`. The first recognized field wins, and an
/// unrecognizable body decodes as invalid rather than erroring, matching how
/// resource servers have historically treated garbled verify answers.
fn decode_verification(raw: &Value) -> VerificationResult {
    let is_valid = ["isValid", "valid", "success"]
        .iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_bool))
        .unwrap_or(false);
    VerificationResult {
        is_valid,
        error: raw.get("error").and_then(Value::as_str).map(str::to_owned),
    }
}

/// Extracts the payload from a facilitator envelope, mapping failure
/// envelopes to [`FacilitatorClientError::Rejected`].
fn unwrap_envelope<T>(
    envelope: Envelope<T>,
    context: &'static str,
) -> Result<T, FacilitatorClientError> {
    match envelope {
        Envelope {
            data: Some(data), ..
        } => Ok(data),
        Envelope { error, .. } => Err(FacilitatorClientError::Rejected {
            context,
            message: error.unwrap_or_else(|| "missing response data".to_owned()),
        }),
    }
}
