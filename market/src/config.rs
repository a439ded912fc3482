use connectors::{
    coingecko::COINGECKO_API_URL, coinpaprika::COINPAPRIKA_API_URL, MarketQuery, ProviderConfig,
    RetryPolicy,
};
use std::time::Duration;
use store::StoreConfig;
use tracing::warn;

pub const DEFAULT_PINNED: &[&str] = &[
    "BTC", "ETH", "BNB", "XRP", "ADA", "DOGE", "SOL", "TRX", "DOT", "MATIC",
];
pub const DEFAULT_STABLECOINS: &[&str] = &["USDT", "USDC", "BUSD", "DAI"];

/// How derived views are cut from the base list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationRules {
    /// Symbols that head the default view, in this order
    pub pinned_symbols: Vec<String>,
    /// Symbols never shown as trending
    pub stablecoins: Vec<String>,
    /// Size of the trending, gainers and losers views
    pub top_n: usize,
}

impl Default for DerivationRules {
    fn default() -> Self {
        Self {
            pinned_symbols: DEFAULT_PINNED.iter().map(|s| s.to_string()).collect(),
            stablecoins: DEFAULT_STABLECOINS.iter().map(|s| s.to_string()).collect(),
            top_n: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub coin_interval: Duration,
    pub global_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            coin_interval: Duration::from_secs(30),
            global_interval: Duration::from_secs(90),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub query: MarketQuery,
    pub primary: ProviderConfig,
    /// `None` disables the fallback provider
    pub secondary: Option<ProviderConfig>,
    pub retry: RetryPolicy,
    /// Bound on one provider call including its retries
    pub resource_timeout: Duration,
    /// `host:port` probed before network attempts; `None` assumes online
    pub probe_addr: Option<String>,
    pub rules: DerivationRules,
    pub scheduler: SchedulerConfig,
    pub watchlist_debounce: Duration,
    pub store: StoreConfig,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            query: MarketQuery::default(),
            primary: ProviderConfig::new(COINGECKO_API_URL),
            secondary: Some(ProviderConfig::new(COINPAPRIKA_API_URL)),
            retry: RetryPolicy::default(),
            resource_timeout: Duration::from_secs(60),
            probe_addr: Some("api.coingecko.com:443".to_string()),
            rules: DerivationRules::default(),
            scheduler: SchedulerConfig::default(),
            watchlist_debounce: Duration::from_millis(400),
            store: StoreConfig::default(),
        }
    }
}

impl MarketConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(currency) = lookup("COINWATCH_CURRENCY").filter(|c| !c.trim().is_empty()) {
            config.query.currency = currency.trim().to_lowercase();
        }
        config.query.page_size = parse_or(&lookup, "COINWATCH_PAGE_SIZE", config.query.page_size);

        let request_secs = parse_or(&lookup, "COINWATCH_REQUEST_TIMEOUT_SECS", 20u64);
        if let Some(url) = lookup("COINGECKO_BASE_URL") {
            config.primary = ProviderConfig::new(&url);
        }
        config.secondary = match lookup("COINPAPRIKA_BASE_URL") {
            Some(url) if url.trim().is_empty() => None,
            Some(url) => Some(ProviderConfig::new(&url)),
            None => config.secondary,
        };
        config.primary.request_timeout = Duration::from_secs(request_secs);
        if let Some(secondary) = config.secondary.as_mut() {
            secondary.request_timeout = Duration::from_secs(request_secs);
        }

        config.resource_timeout =
            Duration::from_secs(parse_or(&lookup, "COINWATCH_RESOURCE_TIMEOUT_SECS", 60u64));
        config.retry = RetryPolicy::new(
            parse_or(&lookup, "COINWATCH_MAX_RETRIES", config.retry.max_retries),
            Duration::from_millis(parse_or(&lookup, "COINWATCH_RETRY_BASE_MS", 1000u64)),
        );

        config.probe_addr = match lookup("COINWATCH_PROBE_ADDR") {
            Some(addr) if addr.trim().is_empty() => None,
            Some(addr) => Some(addr.trim().to_string()),
            None => config.probe_addr,
        };

        if let Some(pinned) = lookup("COINWATCH_PINNED") {
            config.rules.pinned_symbols = symbol_list(&pinned);
        }
        if let Some(stable) = lookup("COINWATCH_STABLECOINS") {
            config.rules.stablecoins = symbol_list(&stable);
        }
        config.rules.top_n = parse_or(&lookup, "COINWATCH_TOP_N", config.rules.top_n);

        let coin_secs = parse_or(&lookup, "COINWATCH_COIN_REFRESH_SECS", 30u64).max(1);
        let global_secs = parse_or(&lookup, "COINWATCH_GLOBAL_REFRESH_SECS", coin_secs * 3).max(1);
        config.scheduler = SchedulerConfig {
            coin_interval: Duration::from_secs(coin_secs),
            global_interval: Duration::from_secs(global_secs),
        };
        config.watchlist_debounce =
            Duration::from_millis(parse_or(&lookup, "COINWATCH_WATCHLIST_DEBOUNCE_MS", 400u64));

        config.store = StoreConfig::from_lookup(&lookup);

        config
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + Copy,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring malformed {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

fn symbol_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
