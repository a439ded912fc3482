use crate::derive::DerivedViews;
use chrono::{DateTime, Utc};
use common::models::{Coin, DataSource, FilterState, GlobalSnapshot};
use serde::Serialize;

/// Load status of the coin list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    /// A list is available; the source tells whether it is fresh
    Loaded(DataSource),
    /// Nothing to show: every source failed and no earlier list exists
    Failed(String),
}

impl LoadStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, LoadStatus::Failed(_))
    }
}

/// Immutable view of the engine state handed to observers
#[derive(Debug, Clone, Default, Serialize)]
pub struct MarketSnapshot {
    /// Increases with every publish
    pub revision: u64,
    pub status: LoadStatus,
    pub coins: Vec<Coin>,
    pub global: Option<GlobalSnapshot>,
    pub global_source: Option<DataSource>,
    pub views: DerivedViews,
    pub watchlist: Vec<Coin>,
    pub filter: FilterState,
    /// Time of the last successful coin list update
    pub last_updated: Option<DateTime<Utc>>,
}
