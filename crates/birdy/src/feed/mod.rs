//! Live flight-data providers.
//!
//! Each provider issues one outbound request per fetch and normalizes its own
//! response shape into [`AircraftState`] records. Providers never retry; the
//! live orchestrator owns the retry and fallback policy.

pub mod airlabs;
pub mod aviationstack;
pub mod opensky;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::{Config, Credentials};
use crate::error::{Error, Result};
use crate::model::{AircraftState, DataSource};

pub use airlabs::AirLabsProvider;
pub use aviationstack::AviationStackProvider;

/// Longest slice of an error body kept in a [`FeedError::Http`] message.
const MAX_ERROR_BODY: usize = 500;

/// Conversion factor from km/h to m/s.
pub(crate) const KMH_TO_MS: f64 = 1.0 / 3.6;

/// A failed upstream request.
#[derive(Error, Debug)]
pub enum FeedError {
    /// The provider answered with an error status, or with an error body.
    #[error("{provider} returned HTTP {status}: {message}")]
    Http {
        /// Provider name.
        provider: &'static str,
        /// HTTP status code (429 for quota errors reported in the body).
        status: u16,
        /// Provider message or body excerpt.
        message: String,
    },

    /// The request could not be sent or the response not received.
    #[error("request to {provider} failed: {source}")]
    Transport {
        /// Provider name.
        provider: &'static str,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body did not have the expected shape.
    #[error("malformed response from {provider}: {message}")]
    Malformed {
        /// Provider name.
        provider: &'static str,
        /// Description of the problem.
        message: String,
    },
}

impl FeedError {
    /// The HTTP status carried by this error, when there is one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            Self::Malformed { .. } => None,
        }
    }

    /// Whether the provider asked us to slow down.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// Name of the provider that failed.
    #[must_use]
    pub fn provider(&self) -> &'static str {
        match self {
            Self::Http { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Malformed { provider, .. } => *provider,
        }
    }
}

/// A third-party source of live aircraft states.
#[async_trait]
pub trait FeedProvider: Send + Sync + Debug {
    /// Which data source this provider reports as.
    fn source(&self) -> DataSource;

    /// Provider name used in logs and errors.
    fn name(&self) -> &'static str {
        self.source().as_str()
    }

    /// Fetch the current snapshot with the given API key.
    async fn fetch(&self, api_key: &str) -> std::result::Result<Vec<AircraftState>, FeedError>;
}

/// A provider paired with the credential it should use.
#[derive(Debug, Clone)]
pub struct ProviderSlot {
    /// The provider.
    pub provider: Arc<dyn FeedProvider>,
    /// API key, if one is configured.
    pub api_key: Option<String>,
}

impl ProviderSlot {
    /// Pair a provider with an optional key.
    #[must_use]
    pub fn new(provider: Arc<dyn FeedProvider>, api_key: Option<String>) -> Self {
        Self { provider, api_key }
    }
}

/// Build the configured providers in fetch order: aviationstack, then AirLabs.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn providers_from_config(config: &Config, credentials: &Credentials) -> Result<Vec<ProviderSlot>> {
    let client = http_client(config.request_timeout())?;
    Ok(vec![
        ProviderSlot::new(
            Arc::new(AviationStackProvider::new(
                client.clone(),
                config.live.aviationstack_base_url.clone(),
            )),
            credentials.aviationstack.clone(),
        ),
        ProviderSlot::new(
            Arc::new(AirLabsProvider::new(
                client,
                config.live.airlabs_base_url.clone(),
            )),
            credentials.airlabs.clone(),
        ),
    ])
}

/// Build an HTTP client with an explicit request timeout.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("birdy/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))
}

/// Send a GET request and decode a JSON body.
///
/// Non-success statuses become [`FeedError::Http`] with a body excerpt.
pub(crate) async fn get_json<T: DeserializeOwned>(
    provider: &'static str,
    request: reqwest::RequestBuilder,
) -> std::result::Result<T, FeedError> {
    let resp = request
        .send()
        .await
        .map_err(|source| FeedError::Transport { provider, source })?;

    let status = resp.status();
    debug!(provider, status = status.as_u16(), "upstream response");

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FeedError::Http {
            provider,
            status: status.as_u16(),
            message: excerpt(&body),
        });
    }

    let body = resp
        .bytes()
        .await
        .map_err(|source| FeedError::Transport { provider, source })?;
    serde_json::from_slice(&body).map_err(|e| FeedError::Malformed {
        provider,
        message: e.to_string(),
    })
}

/// Map a provider's in-body error code onto an HTTP-shaped error.
pub(crate) fn body_error(provider: &'static str, code: &str, message: Option<String>) -> FeedError {
    let status = if is_quota_code(code) { 429 } else { 200 };
    FeedError::Http {
        provider,
        status,
        message: message.unwrap_or_else(|| code.to_string()),
    }
}

fn is_quota_code(code: &str) -> bool {
    let code = code.to_ascii_lowercase();
    code.contains("limit") || code.contains("quota") || code == "too_many_requests"
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}

/// Lowercase an ICAO24 address, rejecting blanks.
pub(crate) fn normalize_icao24(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_ascii_lowercase())
}

/// Trim a free-text field, rejecting blanks.
pub(crate) fn non_empty(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
