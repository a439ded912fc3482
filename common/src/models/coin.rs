use serde::{Deserialize, Serialize};

/// One tradable asset as seen by a market-data provider at fetch time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coin {
    /// Provider-assigned identifier (e.g., "bitcoin", "ethereum")
    pub id: String,
    /// Ticker symbol, upper-cased (e.g., "BTC", "ETH")
    pub symbol: String,
    /// Human-readable name (e.g., "Bitcoin", "Ethereum")
    pub name: String,
    /// Icon URL
    #[serde(default)]
    pub image: Option<String>,
    /// Current price in the quote currency
    pub current_price: f64,
    /// 24h trading volume in the quote currency
    pub total_volume: f64,
    pub market_cap: f64,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_1h: Option<f64>,
    /// 7 day price samples, oldest first
    #[serde(default)]
    pub sparkline_7d: Option<Vec<f64>>,
}

impl Coin {
    pub fn new(id: &str, symbol: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            symbol: symbol.to_uppercase(),
            name: name.to_string(),
            image: None,
            current_price: 0.0,
            total_volume: 0.0,
            market_cap: 0.0,
            market_cap_rank: None,
            price_change_percentage_24h: None,
            price_change_percentage_1h: None,
            sparkline_7d: None,
        }
    }

    /// Case-insensitive substring match against name or symbol.
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
            || self.symbol.to_lowercase().contains(needle_lower)
    }
}

/// Where a published value came from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Fresh response from the named provider
    Provider(String),
    /// Read back from the disk cache
    Cache,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Provider(name) => write!(f, "{}", name),
            DataSource::Cache => write!(f, "cache"),
        }
    }
}
