use crate::{
    coingecko::unix_seconds,
    payload::{dedup_by_symbol, GlobalPayload, MarketsPayload},
    read_json, MarketDataProvider, MarketQuery, ProviderConfig,
};
use async_trait::async_trait;
use common::{
    models::{Coin, GlobalSnapshot},
    Error, Result,
};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

pub const COINPAPRIKA_API_URL: &str = "https://api.coinpaprika.com/v1";

const PROVIDER: &str = "coinpaprika";

/// Secondary provider. Used as a whole-list fallback only.
pub struct CoinPaprikaConnector {
    client: reqwest::Client,
    base_url: String,
}

impl CoinPaprikaConnector {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
            base_url: config.base_url.clone(),
        })
    }
}

/// Entry of `/tickers`
#[derive(Debug, Deserialize)]
pub struct PaprikaTicker {
    id: String,
    name: String,
    symbol: String,
    #[serde(default)]
    rank: u32,
    #[serde(default)]
    quotes: HashMap<String, PaprikaQuote>,
}

#[derive(Debug, Deserialize)]
struct PaprikaQuote {
    price: Option<f64>,
    volume_24h: Option<f64>,
    market_cap: Option<f64>,
    percent_change_1h: Option<f64>,
    percent_change_24h: Option<f64>,
}

impl PaprikaTicker {
    /// Quote keys are upper-case currency codes ("USD").
    pub(crate) fn into_coin(mut self, currency: &str) -> Option<Coin> {
        let quote = self.quotes.remove(&currency.to_uppercase())?;
        let current_price = quote.price.filter(|p| *p > 0.0)?;
        Some(Coin {
            image: Some(format!(
                "https://static.coinpaprika.com/coin/{}/logo.png",
                self.id
            )),
            id: self.id,
            symbol: self.symbol.to_uppercase(),
            name: self.name,
            current_price,
            total_volume: quote.volume_24h.unwrap_or(0.0),
            market_cap: quote.market_cap.unwrap_or(0.0),
            // paprika reports 0 for unranked assets
            market_cap_rank: Some(self.rank).filter(|r| *r > 0),
            price_change_percentage_24h: quote.percent_change_24h,
            price_change_percentage_1h: quote.percent_change_1h,
            sparkline_7d: None,
        })
    }
}

/// Body of `/global`
#[derive(Debug, Deserialize)]
pub struct PaprikaGlobal {
    market_cap_usd: Option<f64>,
    volume_24h_usd: Option<f64>,
    bitcoin_dominance_percentage: Option<f64>,
    cryptocurrencies_number: Option<u64>,
    market_cap_change_24h: Option<f64>,
    last_updated: Option<i64>,
}

impl PaprikaGlobal {
    pub(crate) fn into_snapshot(self) -> GlobalSnapshot {
        let usd = |value: Option<f64>| {
            value
                .map(|v| HashMap::from([("usd".to_string(), v)]))
                .unwrap_or_default()
        };
        GlobalSnapshot {
            total_market_cap: usd(self.market_cap_usd),
            total_volume: usd(self.volume_24h_usd),
            market_cap_percentage: self
                .bitcoin_dominance_percentage
                .map(|v| HashMap::from([("btc".to_string(), v)]))
                .unwrap_or_default(),
            market_cap_change_percentage_24h_usd: self.market_cap_change_24h,
            active_cryptocurrencies: self.cryptocurrencies_number,
            updated_at: self.last_updated.and_then(unix_seconds),
        }
    }
}

/// Paprika has no paging, so the primary's page window is cut locally.
/// Assets listed once per chain are collapsed first so a full page stays full.
fn page_window(coins: Vec<Coin>, query: &MarketQuery) -> Vec<Coin> {
    let skip = (query.page.saturating_sub(1) as usize) * query.page_size as usize;
    dedup_by_symbol(coins)
        .into_iter()
        .skip(skip)
        .take(query.page_size as usize)
        .collect()
}

#[async_trait]
impl MarketDataProvider for CoinPaprikaConnector {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn coin_markets(&self, query: &MarketQuery) -> Result<Vec<Coin>> {
        let url = format!("{}/tickers", self.base_url);
        let quote = query.currency.to_uppercase();

        debug!("Fetching tickers from CoinPaprika: {} (quotes={})", url, quote);

        let response = self
            .client
            .get(&url)
            .query(&[("quotes", quote.as_str())])
            .send()
            .await
            .map_err(Error::from)?;

        let tickers: Vec<PaprikaTicker> = read_json(PROVIDER, response).await?;
        debug!("CoinPaprika returned {} tickers", tickers.len());

        let coins = MarketsPayload::CoinPaprika {
            currency: query.currency.clone(),
            tickers,
        }
        .into_coins();
        Ok(page_window(coins, query))
    }

    async fn global(&self) -> Result<GlobalSnapshot> {
        let url = format!("{}/global", self.base_url);

        debug!("Fetching global market data from CoinPaprika: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Error::from)?;

        let global: PaprikaGlobal = read_json(PROVIDER, response).await?;
        Ok(GlobalPayload::CoinPaprika(global).into_snapshot())
    }
}
