use crate::state::MarketSnapshot;
use common::models::DataSource;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    CoinList,
    Global,
    Watchlist,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::CoinList => write!(f, "coin list"),
            Resource::Global => write!(f, "global snapshot"),
            Resource::Watchlist => write!(f, "watchlist"),
        }
    }
}

/// Broadcast to every subscriber of the engine
#[derive(Debug, Clone)]
pub enum MarketEvent {
    /// A new snapshot was published
    StateChanged(Arc<MarketSnapshot>),
    RefreshFailed {
        resource: Resource,
        message: String,
        /// Earlier data is still being shown
        kept_stale: bool,
    },
    WatchlistUpdated {
        count: usize,
    },
}

/// Result of one refresh request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated(DataSource),
    /// Fetch failed, previous data kept
    KeptStale(String),
    /// Fetch failed with nothing to fall back on
    Failed(String),
    /// Another refresh of the same resource was in flight
    AlreadyRunning,
    /// Result arrived after a newer request superseded it
    Discarded,
}
