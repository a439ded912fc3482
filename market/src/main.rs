use connectors::{
    coingecko::CoinGeckoConnector, coinpaprika::CoinPaprikaConnector, AlwaysOnline, Connectivity,
    MarketDataProvider, TcpProbe,
};
use market::{AutoRefresh, MarketConfig, MarketEngine, MarketEvent, MarketFetcher};
use std::sync::Arc;
use std::time::Duration;
use store::{DiskCache, FavoritesStore, KeyValueStore};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting coinwatch");

    let config = MarketConfig::from_env();

    // Create market-data providers
    let primary: Arc<dyn MarketDataProvider> = Arc::new(
        CoinGeckoConnector::new(&config.primary)
            .map_err(|e| format!("Failed to create primary provider: {}", e))?,
    );
    let secondary: Option<Arc<dyn MarketDataProvider>> = match &config.secondary {
        Some(provider) => Some(Arc::new(
            CoinPaprikaConnector::new(provider)
                .map_err(|e| format!("Failed to create secondary provider: {}", e))?,
        )),
        None => None,
    };

    let connectivity: Arc<dyn Connectivity> = match &config.probe_addr {
        Some(addr) => Arc::new(TcpProbe::new(addr, Duration::from_secs(3))),
        None => Arc::new(AlwaysOnline),
    };

    let cache = DiskCache::new(config.store.cache_dir.clone());
    let favorites = Arc::new(FavoritesStore::open(KeyValueStore::new(
        config.store.favorites_path.clone(),
    )));

    let fetcher = Arc::new(
        MarketFetcher::new(primary, secondary, cache, connectivity)
            .with_retry(config.retry)
            .with_resource_timeout(config.resource_timeout)
            .with_query(config.query.clone()),
    );
    let engine = MarketEngine::with_watchlist_debounce(
        fetcher,
        favorites,
        config.rules.clone(),
        config.watchlist_debounce,
    );

    let mut events = engine.subscribe();
    let reporter = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(MarketEvent::StateChanged(snapshot)) => debug!(
                    "Snapshot r{}: {} coins, {} visible, status {:?}",
                    snapshot.revision,
                    snapshot.coins.len(),
                    snapshot.views.visible.len(),
                    snapshot.status
                ),
                Ok(MarketEvent::RefreshFailed {
                    resource,
                    message,
                    kept_stale,
                }) => warn!(
                    "Refresh of {} failed (showing stale data: {}): {}",
                    resource, kept_stale, message
                ),
                Ok(MarketEvent::WatchlistUpdated { count }) => {
                    info!("Watchlist holds {} coins", count)
                }
                Err(RecvError::Lagged(skipped)) => debug!("Skipped {} market events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    if engine.load_cached().await {
        info!("Showing cached market data until the first refresh completes");
    }
    let scheduler = AutoRefresh::start(Arc::clone(&engine), &config.scheduler);

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    scheduler.stop().await;
    reporter.abort();

    Ok(())
}
