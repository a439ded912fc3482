pub mod coingecko;
pub mod coinpaprika;
pub mod connectivity;
pub mod payload;
pub mod retry;

use async_trait::async_trait;
use common::{
    models::{Coin, GlobalSnapshot},
    Error, Result,
};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::error;

pub use connectivity::{AlwaysOnline, Connectivity, TcpProbe};
pub use retry::{retry_with_backoff, RetryPolicy};

/// Trait defining the interface for market-data API clients
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Short provider name used in logs and provenance
    fn name(&self) -> &str;

    /// Ranked coin list for the query, normalized to canonical records
    async fn coin_markets(&self, query: &MarketQuery) -> Result<Vec<Coin>>;

    /// Global market snapshot
    async fn global(&self) -> Result<GlobalSnapshot>;

    /// Market rows restricted to the given identifiers
    async fn coins_by_ids(&self, ids: &[String], query: &MarketQuery) -> Result<Vec<Coin>> {
        let _ = (ids, query);
        Err(Error::Unsupported(format!(
            "{} does not support lookups by id",
            self.name()
        )))
    }
}

/// Parameters of a coin list request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketQuery {
    /// Quote currency, lower-case (e.g., "usd")
    pub currency: String,
    pub page_size: u32,
    pub page: u32,
    pub include_sparkline: bool,
    /// Requested percentage-change windows (e.g., "1h", "24h")
    pub change_windows: Vec<String>,
}

impl Default for MarketQuery {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            page_size: 100,
            page: 1,
            include_sparkline: true,
            change_windows: vec!["1h".to_string(), "24h".to_string()],
        }
    }
}

/// Connection settings shared by the HTTP connectors
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Upper bound for one request, connect to last body byte
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl ProviderConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub(crate) fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(concat!("coinwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))
    }
}

/// Reads the whole body of a response and decodes it, mapping non-2xx
/// statuses to `RateLimited` / `BadServerResponse`.
pub(crate) async fn read_json<T: DeserializeOwned>(
    provider: &str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        error!("{} API error: {} - {}", provider, status, error_text);
        return Err(Error::from_status(provider, status.as_u16()));
    }

    // a failed body read is a dropped connection, not a decode problem
    let body = response.bytes().await.map_err(|e| {
        Error::TransientNetwork(format!("{} response body interrupted: {}", provider, e))
    })?;
    serde_json::from_slice(&body).map_err(|e| {
        Error::DecodeError(format!("Failed to parse {} response: {}", provider, e))
    })
}
