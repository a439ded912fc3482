use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregate market figures. Amount maps are keyed by lower-case currency
/// code ("usd"), the dominance map by lower-case asset symbol ("btc").
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlobalSnapshot {
    pub total_market_cap: HashMap<String, f64>,
    pub total_volume: HashMap<String, f64>,
    pub market_cap_percentage: HashMap<String, f64>,
    #[serde(default)]
    pub market_cap_change_percentage_24h_usd: Option<f64>,
    #[serde(default)]
    pub active_cryptocurrencies: Option<u64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl GlobalSnapshot {
    pub fn total_market_cap_in(&self, currency: &str) -> Option<f64> {
        self.total_market_cap.get(&currency.to_lowercase()).copied()
    }

    pub fn total_volume_in(&self, currency: &str) -> Option<f64> {
        self.total_volume.get(&currency.to_lowercase()).copied()
    }

    pub fn btc_dominance(&self) -> Option<f64> {
        self.market_cap_percentage.get("btc").copied()
    }

    pub fn eth_dominance(&self) -> Option<f64> {
        self.market_cap_percentage.get("eth").copied()
    }
}
