use crate::config::DerivationRules;
use crate::derive::{derive_views, DerivedViews};
use crate::events::{MarketEvent, RefreshOutcome, Resource};
use crate::fetcher::MarketFetcher;
use crate::state::{LoadStatus, MarketSnapshot};
use chrono::{DateTime, Utc};
use common::{
    models::{Coin, DataSource, FilterState, GlobalSnapshot, Segment, SortDirection, SortKey},
    Error, Result,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use store::FavoritesStore;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

#[derive(Default)]
struct EngineState {
    revision: u64,
    status: LoadStatus,
    coins: Vec<Coin>,
    global: Option<GlobalSnapshot>,
    global_source: Option<DataSource>,
    watchlist: Vec<Coin>,
    filter: FilterState,
    views: DerivedViews,
    last_updated: Option<DateTime<Utc>>,
}

impl EngineState {
    fn snapshot(&self) -> MarketSnapshot {
        MarketSnapshot {
            revision: self.revision,
            status: self.status.clone(),
            coins: self.coins.clone(),
            global: self.global.clone(),
            global_source: self.global_source.clone(),
            views: self.views.clone(),
            watchlist: self.watchlist.clone(),
            filter: self.filter.clone(),
            last_updated: self.last_updated,
        }
    }
}

/// Clears its flag when dropped
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A coin refresh between publishing `Loading` and publishing its result.
/// Dropped early (the refresh future was cancelled), it puts the previous
/// status back.
struct PendingRefresh<'a> {
    engine: &'a MarketEngine,
    previous: Option<LoadStatus>,
    _in_flight: InFlight<'a>,
}

impl PendingRefresh<'_> {
    fn settle(&mut self) -> LoadStatus {
        self.previous.take().unwrap_or_default()
    }
}

impl Drop for PendingRefresh<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            debug!("Coin list refresh abandoned, restoring {:?}", previous);
            self.engine.update(|state| {
                if state.status == LoadStatus::Loading {
                    state.status = previous;
                }
            });
        }
    }
}

/// Owns the canonical coin list and everything derived from it.
///
/// Construct one per application and share the `Arc`. State is only
/// mutated here, under one lock; observers get immutable snapshots through
/// [`MarketEngine::watch_snapshots`] or events through [`MarketEngine::subscribe`].
///
/// The engine follows the favorites store for its whole life: any change,
/// whoever makes it, recomputes the views right away and re-fetches the
/// watchlist once changes stop for the debounce window. Must be created
/// inside a Tokio runtime.
pub struct MarketEngine {
    fetcher: Arc<MarketFetcher>,
    favorites: Arc<FavoritesStore>,
    rules: DerivationRules,
    watchlist_debounce: Duration,
    state: Mutex<EngineState>,
    favorites_task: Mutex<Option<JoinHandle<()>>>,
    coins_in_flight: AtomicBool,
    global_in_flight: AtomicBool,
    watchlist_in_flight: AtomicBool,
    watchlist_generation: AtomicU64,
    snapshot_tx: watch::Sender<Arc<MarketSnapshot>>,
    events_tx: broadcast::Sender<MarketEvent>,
}

impl MarketEngine {
    pub fn new(
        fetcher: Arc<MarketFetcher>,
        favorites: Arc<FavoritesStore>,
        rules: DerivationRules,
    ) -> Arc<Self> {
        Self::with_watchlist_debounce(fetcher, favorites, rules, Duration::from_millis(400))
    }

    /// Same as [`MarketEngine::new`] with a custom favorites debounce.
    pub fn with_watchlist_debounce(
        fetcher: Arc<MarketFetcher>,
        favorites: Arc<FavoritesStore>,
        rules: DerivationRules,
        debounce: Duration,
    ) -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(Arc::new(MarketSnapshot::default()));
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let changes = favorites.subscribe();
        let engine = Arc::new(Self {
            fetcher,
            favorites,
            rules,
            watchlist_debounce: debounce,
            state: Mutex::new(EngineState::default()),
            favorites_task: Mutex::new(None),
            coins_in_flight: AtomicBool::new(false),
            global_in_flight: AtomicBool::new(false),
            watchlist_in_flight: AtomicBool::new(false),
            watchlist_generation: AtomicU64::new(0),
            snapshot_tx,
            events_tx,
        });

        let task = tokio::spawn(follow_favorites(Arc::downgrade(&engine), changes));
        *engine
            .favorites_task
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(task);
        engine
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<MarketSnapshot> {
        self.snapshot_tx.borrow().clone()
    }

    pub fn watch_snapshots(&self) -> watch::Receiver<Arc<MarketSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<MarketEvent> {
        self.events_tx.subscribe()
    }

    pub fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    /// Publishes whatever the disk cache holds. Returns `false` when it was empty.
    pub async fn load_cached(&self) -> bool {
        let coins = self.fetcher.cached_coins().await;
        let global = self.fetcher.cached_global().await;
        if coins.is_none() && global.is_none() {
            debug!("No cached market data to seed from");
            return false;
        }

        self.update(|state| {
            if let Some(coins) = coins {
                if state.coins.is_empty() {
                    info!("Seeded {} coins from cache", coins.len());
                    state.coins = coins;
                    state.status = LoadStatus::Loaded(DataSource::Cache);
                }
            }
            if state.global.is_none() {
                if let Some(global) = global {
                    state.global = Some(global);
                    state.global_source = Some(DataSource::Cache);
                }
            }
        });
        true
    }

    /// Re-fetches the coin list. A refresh already in flight makes this a no-op.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(in_flight) = InFlight::acquire(&self.coins_in_flight) else {
            debug!("Coin list refresh already in flight");
            return RefreshOutcome::AlreadyRunning;
        };

        let previous = {
            let mut state = self.lock_state();
            let previous = std::mem::replace(&mut state.status, LoadStatus::Loading);
            self.publish(&mut state);
            previous
        };
        let mut pending = PendingRefresh {
            engine: self,
            previous: Some(previous),
            _in_flight: in_flight,
        };

        let result = self.fetcher.fetch_coin_markets().await;
        let previous = pending.settle();
        match result {
            Ok(fetched) => {
                let source = fetched.source;
                let count = fetched.value.len();
                self.update(|state| {
                    state.coins = fetched.value;
                    state.status = LoadStatus::Loaded(source.clone());
                    state.last_updated = Some(Utc::now());
                });
                info!("Coin list updated: {} coins from {}", count, source);
                RefreshOutcome::Updated(source)
            }
            Err(e) => self.coin_refresh_failed(previous, e),
        }
    }

    fn coin_refresh_failed(&self, previous: LoadStatus, err: Error) -> RefreshOutcome {
        let mut state = self.lock_state();

        if !state.coins.is_empty() {
            warn!("Coin list refresh failed, keeping {} stale coins: {}", state.coins.len(), err);
            state.status = match previous {
                LoadStatus::Loaded(source) => LoadStatus::Loaded(source),
                _ => LoadStatus::Loaded(DataSource::Cache),
            };
            self.publish(&mut state);
            self.emit(MarketEvent::RefreshFailed {
                resource: Resource::CoinList,
                message: err.to_string(),
                kept_stale: true,
            });
            return RefreshOutcome::KeptStale(err.to_string());
        }

        let message = format!("{} ({})", Error::NoDataAvailable, err);
        warn!("Coin list unavailable: {}", message);
        state.status = LoadStatus::Failed(message.clone());
        self.publish(&mut state);
        self.emit(MarketEvent::RefreshFailed {
            resource: Resource::CoinList,
            message: message.clone(),
            kept_stale: false,
        });
        RefreshOutcome::Failed(message)
    }

    /// Re-fetches the global snapshot; independent of the coin list.
    pub async fn refresh_global(&self) -> RefreshOutcome {
        let Some(_guard) = InFlight::acquire(&self.global_in_flight) else {
            debug!("Global refresh already in flight");
            return RefreshOutcome::AlreadyRunning;
        };

        match self.fetcher.fetch_global_data().await {
            Ok(fetched) => {
                let source = fetched.source;
                self.update(|state| {
                    state.global = Some(fetched.value);
                    state.global_source = Some(source.clone());
                });
                debug!("Global snapshot updated from {}", source);
                RefreshOutcome::Updated(source)
            }
            Err(e) => {
                let kept_stale = self.lock_state().global.is_some();
                warn!("Global refresh failed (kept_stale={}): {}", kept_stale, e);
                self.emit(MarketEvent::RefreshFailed {
                    resource: Resource::Global,
                    message: e.to_string(),
                    kept_stale,
                });
                if kept_stale {
                    RefreshOutcome::KeptStale(e.to_string())
                } else {
                    RefreshOutcome::Failed(e.to_string())
                }
            }
        }
    }

    /// Re-fetches the favorites watchlist unless one is already loading.
    pub async fn refresh_watchlist(&self) -> RefreshOutcome {
        let Some(_guard) = InFlight::acquire(&self.watchlist_in_flight) else {
            return RefreshOutcome::AlreadyRunning;
        };
        let generation = self.watchlist_generation.load(Ordering::SeqCst);
        self.load_watchlist(generation).await
    }

    async fn load_watchlist(&self, generation: u64) -> RefreshOutcome {
        let ids: Vec<String> = self.favorites.get_all().into_iter().collect();

        let fetched = match self.fetcher.fetch_watchlist(&ids).await {
            Ok(fetched) => fetched,
            Err(e) => {
                // supplementary view: keep the previous rows
                warn!("Watchlist refresh failed: {}", e);
                self.emit(MarketEvent::RefreshFailed {
                    resource: Resource::Watchlist,
                    message: e.to_string(),
                    kept_stale: true,
                });
                return RefreshOutcome::KeptStale(e.to_string());
            }
        };

        let mut state = self.lock_state();
        if self.watchlist_generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding watchlist fetched for superseded favorites");
            return RefreshOutcome::Discarded;
        }
        let count = fetched.value.len();
        state.watchlist = fetched.value;
        self.publish(&mut state);
        self.emit(MarketEvent::WatchlistUpdated { count });
        RefreshOutcome::Updated(fetched.source)
    }

    pub fn set_segment(&self, segment: Segment) {
        self.update(|state| state.filter.segment = segment);
    }

    pub fn set_search(&self, search: &str) {
        self.update(|state| state.filter.search = search.to_string());
    }

    pub fn set_sort(&self, key: SortKey, direction: SortDirection) {
        self.update(|state| {
            state.filter.sort_key = key;
            state.filter.sort_direction = direction;
        });
    }

    /// Returns whether the coin is a favorite afterwards. Views reflect the
    /// change by the time this returns.
    pub async fn toggle_favorite(&self, id: &str) -> Result<bool> {
        let favorites = Arc::clone(&self.favorites);
        let id = id.to_string();
        let now_favorite = tokio::task::spawn_blocking(move || favorites.toggle(&id))
            .await
            .map_err(|e| Error::InternalError(format!("favorites write did not finish: {}", e)))??;
        self.favorites_changed();
        Ok(now_favorite)
    }

    fn favorites_changed(&self) {
        self.watchlist_generation.fetch_add(1, Ordering::SeqCst);
        self.update(|_| {});
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut EngineState),
    {
        let mut state = self.lock_state();
        change(&mut state);
        self.publish(&mut state);
    }

    /// Recomputes every derived view and publishes the result as one snapshot.
    fn publish(&self, state: &mut EngineState) {
        let favorite_ids = self.favorites.get_all();
        state.views = derive_views(&state.coins, &favorite_ids, &state.filter, &self.rules);
        state.revision += 1;

        let snapshot = Arc::new(state.snapshot());
        self.snapshot_tx.send_replace(Arc::clone(&snapshot));
        self.emit(MarketEvent::StateChanged(snapshot));
    }

    fn emit(&self, event: MarketEvent) {
        // no subscribers is fine
        let _ = self.events_tx.send(event);
    }
}

impl Drop for MarketEngine {
    fn drop(&mut self) {
        let task = self
            .favorites_task
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}

/// Views are recomputed on every favorites change; the watchlist is
/// re-fetched once changes stop for the debounce window. A change arriving
/// while a fetch runs cancels that fetch.
async fn follow_favorites(
    engine: Weak<MarketEngine>,
    mut changes: watch::Receiver<BTreeSet<String>>,
) {
    let mut in_flight: Option<JoinHandle<RefreshOutcome>> = None;

    while changes.changed().await.is_ok() {
        let Some(current) = engine.upgrade() else {
            break;
        };
        current.favorites_changed();
        if let Some(task) = in_flight.take() {
            task.abort();
        }

        let debounce = current.watchlist_debounce;
        drop(current);
        loop {
            match tokio::time::timeout(debounce, changes.changed()).await {
                Ok(Ok(())) => match engine.upgrade() {
                    Some(current) => current.favorites_changed(),
                    None => return,
                },
                Ok(Err(_)) => return,
                Err(_) => break,
            }
        }

        let Some(worker) = engine.upgrade() else {
            break;
        };
        let generation = worker.watchlist_generation.load(Ordering::SeqCst);
        in_flight = Some(tokio::spawn(async move {
            worker.load_watchlist(generation).await
        }));
    }
    debug!("Favorites follower stopped");
}
