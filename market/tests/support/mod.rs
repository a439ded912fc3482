#![allow(dead_code)]

use async_trait::async_trait;
use common::{
    models::{Coin, GlobalSnapshot},
    Error, Result,
};
use connectors::{Connectivity, MarketDataProvider, MarketQuery, RetryPolicy};
use market::{DerivationRules, MarketEngine, MarketFetcher};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use store::{DiskCache, FavoritesStore, KeyValueStore};
use tempfile::TempDir;

/// Provider answering from scripted queues. When a queue runs dry the
/// matching fallback answer is repeated.
pub struct ScriptedProvider {
    name: String,
    markets: Mutex<VecDeque<Result<Vec<Coin>>>>,
    markets_fallback: Mutex<Result<Vec<Coin>>>,
    markets_delay: Mutex<Duration>,
    global: Mutex<VecDeque<Result<GlobalSnapshot>>>,
    global_fallback: Mutex<Result<GlobalSnapshot>>,
    by_ids: Mutex<Result<Vec<Coin>>>,
    by_ids_delay: Mutex<Duration>,
    pub market_calls: AtomicUsize,
    pub global_calls: AtomicUsize,
    pub by_ids_calls: AtomicUsize,
    pub requested_ids: Mutex<Vec<Vec<String>>>,
}

impl ScriptedProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            markets: Mutex::new(VecDeque::new()),
            markets_fallback: Mutex::new(Err(Error::TransientNetwork("unscripted".into()))),
            markets_delay: Mutex::new(Duration::ZERO),
            global: Mutex::new(VecDeque::new()),
            global_fallback: Mutex::new(Err(Error::TransientNetwork("unscripted".into()))),
            by_ids: Mutex::new(Ok(Vec::new())),
            by_ids_delay: Mutex::new(Duration::ZERO),
            market_calls: AtomicUsize::new(0),
            global_calls: AtomicUsize::new(0),
            by_ids_calls: AtomicUsize::new(0),
            requested_ids: Mutex::new(Vec::new()),
        }
    }

    pub fn push_markets(&self, result: Result<Vec<Coin>>) {
        self.markets.lock().unwrap().push_back(result);
    }

    pub fn always_markets(&self, result: Result<Vec<Coin>>) {
        *self.markets_fallback.lock().unwrap() = result;
    }

    pub fn slow_markets(&self, delay: Duration) {
        *self.markets_delay.lock().unwrap() = delay;
    }

    pub fn always_global(&self, result: Result<GlobalSnapshot>) {
        *self.global_fallback.lock().unwrap() = result;
    }

    pub fn push_global(&self, result: Result<GlobalSnapshot>) {
        self.global.lock().unwrap().push_back(result);
    }

    pub fn answer_by_ids(&self, result: Result<Vec<Coin>>, delay: Duration) {
        *self.by_ids.lock().unwrap() = result;
        *self.by_ids_delay.lock().unwrap() = delay;
    }

    pub fn market_calls(&self) -> usize {
        self.market_calls.load(Ordering::SeqCst)
    }

    pub fn global_calls(&self) -> usize {
        self.global_calls.load(Ordering::SeqCst)
    }

    pub fn by_ids_calls(&self) -> usize {
        self.by_ids_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn coin_markets(&self, _query: &MarketQuery) -> Result<Vec<Coin>> {
        self.market_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.markets_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let next = self.markets.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.markets_fallback.lock().unwrap().clone())
    }

    async fn global(&self) -> Result<GlobalSnapshot> {
        self.global_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.global.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.global_fallback.lock().unwrap().clone())
    }

    async fn coins_by_ids(&self, ids: &[String], _query: &MarketQuery) -> Result<Vec<Coin>> {
        self.by_ids_calls.fetch_add(1, Ordering::SeqCst);
        self.requested_ids.lock().unwrap().push(ids.to_vec());
        let delay = *self.by_ids_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let rows = self.by_ids.lock().unwrap().clone()?;
        Ok(rows.into_iter().filter(|c| ids.contains(&c.id)).collect())
    }
}

/// Connectivity switch flipped by the test
pub struct Switch(pub AtomicBool);

impl Switch {
    pub fn online() -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(true)))
    }

    pub fn offline() -> Arc<Self> {
        Arc::new(Self(AtomicBool::new(false)))
    }

    pub fn set(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connectivity for Switch {
    async fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn coin(id: &str, symbol: &str, price: f64, volume: f64, cap: f64, change: Option<f64>) -> Coin {
    let mut coin = Coin::new(id, symbol, id);
    coin.current_price = price;
    coin.total_volume = volume;
    coin.market_cap = cap;
    coin.price_change_percentage_24h = change;
    coin
}

pub fn sample_coins() -> Vec<Coin> {
    vec![
        coin("bitcoin", "btc", 65000.0, 30e9, 1.2e12, Some(2.0)),
        coin("ethereum", "eth", 3200.0, 15e9, 4.0e11, Some(-1.0)),
        coin("dogecoin", "doge", 0.15, 1e9, 2.0e10, Some(10.0)),
    ]
}

pub fn sample_global() -> GlobalSnapshot {
    let mut global = GlobalSnapshot::default();
    global.total_market_cap.insert("usd".to_string(), 2.4e12);
    global.market_cap_percentage.insert("btc".to_string(), 52.0);
    global.active_cryptocurrencies = Some(10000);
    global
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(1))
}

/// Everything an engine test needs, rooted in a temporary directory
pub struct Harness {
    pub dir: TempDir,
    pub primary: Arc<ScriptedProvider>,
    pub secondary: Arc<ScriptedProvider>,
    pub connectivity: Arc<Switch>,
    pub favorites: Arc<FavoritesStore>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let favorites = Arc::new(FavoritesStore::open(KeyValueStore::new(
            dir.path().join("favorites.json"),
        )));
        Self {
            dir,
            primary: Arc::new(ScriptedProvider::new("primary")),
            secondary: Arc::new(ScriptedProvider::new("secondary")),
            connectivity: Switch::online(),
            favorites,
        }
    }

    pub fn cache(&self) -> DiskCache {
        DiskCache::new(self.dir.path().join("cache"))
    }

    pub fn fetcher(&self, with_secondary: bool) -> MarketFetcher {
        let secondary: Option<Arc<dyn MarketDataProvider>> = if with_secondary {
            Some(self.secondary.clone())
        } else {
            None
        };
        MarketFetcher::new(
            self.primary.clone(),
            secondary,
            self.cache(),
            self.connectivity.clone(),
        )
        .with_retry(fast_retry())
        .with_resource_timeout(Duration::from_secs(5))
    }

    pub fn engine(&self, debounce: Duration) -> Arc<MarketEngine> {
        MarketEngine::with_watchlist_debounce(
            Arc::new(self.fetcher(false)),
            self.favorites.clone(),
            DerivationRules::default(),
            debounce,
        )
    }
}
