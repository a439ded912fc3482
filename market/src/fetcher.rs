use common::{
    models::{Coin, DataSource, GlobalSnapshot},
    Error, Result,
};
use connectors::{
    payload::dedup_by_symbol, retry_with_backoff, Connectivity, MarketDataProvider, MarketQuery,
    RetryPolicy,
};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use store::{CacheKey, DiskCache};
use tracing::{debug, info, warn};

/// A value together with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub source: DataSource,
}

/// Fetch Layer: primary provider with retries, then the disk cache, then the
/// secondary provider. Successful network results overwrite the cache.
pub struct MarketFetcher {
    primary: Arc<dyn MarketDataProvider>,
    secondary: Option<Arc<dyn MarketDataProvider>>,
    cache: DiskCache,
    connectivity: Arc<dyn Connectivity>,
    retry: RetryPolicy,
    resource_timeout: Duration,
    query: MarketQuery,
}

impl MarketFetcher {
    pub fn new(
        primary: Arc<dyn MarketDataProvider>,
        secondary: Option<Arc<dyn MarketDataProvider>>,
        cache: DiskCache,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            primary,
            secondary,
            cache,
            connectivity,
            retry: RetryPolicy::default(),
            resource_timeout: Duration::from_secs(60),
            query: MarketQuery::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_resource_timeout(mut self, timeout: Duration) -> Self {
        self.resource_timeout = timeout;
        self
    }

    pub fn with_query(mut self, query: MarketQuery) -> Self {
        self.query = query;
        self
    }

    /// Cached coin list, if any. Used as the cold-start seed.
    pub async fn cached_coins(&self) -> Option<Vec<Coin>> {
        self.cache.load(CacheKey::CoinMarkets).await
    }

    pub async fn cached_global(&self) -> Option<GlobalSnapshot> {
        self.cache.load(CacheKey::GlobalSnapshot).await
    }

    pub async fn fetch_coin_markets(&self) -> Result<Fetched<Vec<Coin>>> {
        let query = &self.query;
        self.fetch_with_fallback(
            CacheKey::CoinMarkets,
            |provider| provider.coin_markets(query),
            // the fallback lists one asset per chain under different ids
            dedup_by_symbol,
        )
        .await
    }

    pub async fn fetch_global_data(&self) -> Result<Fetched<GlobalSnapshot>> {
        self.fetch_with_fallback(
            CacheKey::GlobalSnapshot,
            |provider| provider.global(),
            |snapshot| snapshot,
        )
        .await
    }

    /// Watchlist rows for `ids` from the primary provider. Not cached and
    /// no secondary: callers treat failures as "keep what you have".
    pub async fn fetch_watchlist(&self, ids: &[String]) -> Result<Fetched<Vec<Coin>>> {
        let provider = self.primary.as_ref();
        if ids.is_empty() {
            return Ok(Fetched {
                value: Vec::new(),
                source: DataSource::Provider(provider.name().to_string()),
            });
        }
        if !self.connectivity.is_online().await {
            return Err(Error::TransientNetwork("no network connectivity".to_string()));
        }

        let query = &self.query;
        let value = self
            .attempt(provider, || provider.coins_by_ids(ids, query))
            .await?;
        Ok(Fetched {
            value,
            source: DataSource::Provider(provider.name().to_string()),
        })
    }

    async fn fetch_with_fallback<'a, T, Op, Fut, N>(
        &'a self,
        key: CacheKey,
        op: Op,
        normalize_secondary: N,
    ) -> Result<Fetched<T>>
    where
        T: Serialize + DeserializeOwned,
        Op: Fn(&'a dyn MarketDataProvider) -> Fut,
        Fut: Future<Output = Result<T>>,
        N: FnOnce(T) -> T,
    {
        if !self.connectivity.is_online().await {
            warn!("No connectivity, serving {} from cache", key);
            return self
                .from_cache(key)
                .await
                .ok_or_else(|| Error::TransientNetwork("no network connectivity".to_string()));
        }

        let primary = self.primary.as_ref();
        let primary_err = match self.attempt(primary, || op(primary)).await {
            Ok(value) => return Ok(self.store(key, value, primary.name()).await),
            Err(e) => e,
        };
        warn!("{} fetch from {} failed: {}", key, primary.name(), primary_err);

        if let Some(cached) = self.from_cache(key).await {
            warn!("Serving stale {} from cache", key);
            return Ok(cached);
        }

        if let Some(secondary) = self.secondary.as_deref() {
            info!("Falling back to {} for {}", secondary.name(), key);
            match self.attempt(secondary, || op(secondary)).await {
                Ok(value) => {
                    let value = normalize_secondary(value);
                    return Ok(self.store(key, value, secondary.name()).await);
                }
                Err(e) => warn!("{} fetch from {} failed: {}", key, secondary.name(), e),
            }
        }

        // the primary's error is the one callers can act on (e.g. rate limiting)
        Err(primary_err)
    }

    /// One provider call with retries, bounded by the resource timeout.
    async fn attempt<T, F, Fut>(&self, provider: &dyn MarketDataProvider, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        debug!("Requesting {} (max {} retries)", provider.name(), self.retry.max_retries);
        match tokio::time::timeout(
            self.resource_timeout,
            retry_with_backoff(&self.retry, Error::is_transient, op),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::TransientNetwork(format!(
                "{} did not answer within {:?}",
                provider.name(),
                self.resource_timeout
            ))),
        }
    }

    async fn store<T: Serialize>(&self, key: CacheKey, value: T, provider: &str) -> Fetched<T> {
        if let Err(e) = self.cache.save(key, &value).await {
            warn!("Failed to write {} cache: {}", key, e);
        }
        Fetched {
            value,
            source: DataSource::Provider(provider.to_string()),
        }
    }

    async fn from_cache<T: DeserializeOwned>(&self, key: CacheKey) -> Option<Fetched<T>> {
        self.cache.load(key).await.map(|value| Fetched {
            value,
            source: DataSource::Cache,
        })
    }
}
