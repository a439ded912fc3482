use crate::{
    payload::{GlobalPayload, MarketsPayload},
    read_json, MarketDataProvider, MarketQuery, ProviderConfig,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use common::{
    models::{Coin, GlobalSnapshot},
    Error, Result,
};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

const PROVIDER: &str = "coingecko";

pub struct CoinGeckoConnector {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoConnector {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
            base_url: config.base_url.clone(),
        })
    }

    fn markets_params(query: &MarketQuery) -> Vec<(&'static str, String)> {
        vec![
            ("vs_currency", query.currency.to_lowercase()),
            ("order", "market_cap_desc".to_string()),
            ("per_page", query.page_size.to_string()),
            ("page", query.page.to_string()),
            ("sparkline", query.include_sparkline.to_string()),
            ("price_change_percentage", query.change_windows.join(",")),
        ]
    }

    async fn fetch_markets(&self, params: &[(&'static str, String)]) -> Result<Vec<Coin>> {
        let url = format!("{}/coins/markets", self.base_url);

        debug!("Fetching coin markets from CoinGecko: {}", url);

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(Error::from)?;

        let rows: Vec<GeckoMarket> = read_json(PROVIDER, response).await?;
        debug!("CoinGecko returned {} market rows", rows.len());

        Ok(MarketsPayload::CoinGecko(rows).into_coins())
    }
}

/// Row of `/coins/markets`
#[derive(Debug, Deserialize)]
pub struct GeckoMarket {
    id: String,
    symbol: String,
    name: String,
    image: Option<String>,
    current_price: Option<f64>,
    market_cap: Option<f64>,
    market_cap_rank: Option<u32>,
    total_volume: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    price_change_percentage_1h_in_currency: Option<f64>,
    price_change_percentage_24h_in_currency: Option<f64>,
    sparkline_in_7d: Option<GeckoSparkline>,
}

#[derive(Debug, Deserialize)]
struct GeckoSparkline {
    price: Vec<f64>,
}

impl GeckoMarket {
    pub(crate) fn into_coin(self) -> Option<Coin> {
        let current_price = self.current_price?;
        Some(Coin {
            id: self.id,
            symbol: self.symbol.to_uppercase(),
            name: self.name,
            image: self.image,
            current_price,
            total_volume: self.total_volume.unwrap_or(0.0),
            market_cap: self.market_cap.unwrap_or(0.0),
            market_cap_rank: self.market_cap_rank,
            price_change_percentage_24h: self
                .price_change_percentage_24h_in_currency
                .or(self.price_change_percentage_24h),
            price_change_percentage_1h: self.price_change_percentage_1h_in_currency,
            sparkline_7d: self
                .sparkline_in_7d
                .map(|s| s.price)
                .filter(|prices| !prices.is_empty()),
        })
    }
}

/// Body of `/global`
#[derive(Debug, Deserialize)]
pub struct GeckoGlobalEnvelope {
    pub(crate) data: GeckoGlobal,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeckoGlobal {
    active_cryptocurrencies: Option<u64>,
    #[serde(default)]
    total_market_cap: HashMap<String, f64>,
    #[serde(default)]
    total_volume: HashMap<String, f64>,
    #[serde(default)]
    market_cap_percentage: HashMap<String, f64>,
    market_cap_change_percentage_24h_usd: Option<f64>,
    updated_at: Option<i64>,
}

impl GeckoGlobal {
    pub(crate) fn into_snapshot(self) -> GlobalSnapshot {
        GlobalSnapshot {
            total_market_cap: self.total_market_cap,
            total_volume: self.total_volume,
            market_cap_percentage: self.market_cap_percentage,
            market_cap_change_percentage_24h_usd: self.market_cap_change_percentage_24h_usd,
            active_cryptocurrencies: self.active_cryptocurrencies,
            updated_at: self.updated_at.and_then(unix_seconds),
        }
    }
}

pub(crate) fn unix_seconds(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}

#[async_trait]
impl MarketDataProvider for CoinGeckoConnector {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn coin_markets(&self, query: &MarketQuery) -> Result<Vec<Coin>> {
        self.fetch_markets(&Self::markets_params(query)).await
    }

    async fn global(&self) -> Result<GlobalSnapshot> {
        let url = format!("{}/global", self.base_url);

        debug!("Fetching global market data from CoinGecko: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Error::from)?;

        let envelope: GeckoGlobalEnvelope = read_json(PROVIDER, response).await?;
        Ok(GlobalPayload::CoinGecko(envelope).into_snapshot())
    }

    async fn coins_by_ids(&self, ids: &[String], query: &MarketQuery) -> Result<Vec<Coin>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut params = Self::markets_params(query);
        params.push(("ids", ids.join(",")));
        // the id filter is applied server side; make sure one page holds them all
        if let Some(per_page) = params.iter_mut().find(|(k, _)| *k == "per_page") {
            per_page.1 = ids.len().max(query.page_size as usize).to_string();
        }

        self.fetch_markets(&params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markets_params_carry_every_query_field() {
        let query = MarketQuery {
            currency: "EUR".into(),
            page_size: 50,
            page: 2,
            include_sparkline: false,
            change_windows: vec!["1h".into(), "24h".into()],
        };
        let params = CoinGeckoConnector::markets_params(&query);
        let get = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("vs_currency"), Some("eur"));
        assert_eq!(get("order"), Some("market_cap_desc"));
        assert_eq!(get("per_page"), Some("50"));
        assert_eq!(get("page"), Some("2"));
        assert_eq!(get("sparkline"), Some("false"));
        assert_eq!(get("price_change_percentage"), Some("1h,24h"));
    }

    #[test]
    fn falls_back_to_plain_24h_change() {
        let row: GeckoMarket = serde_json::from_str(
            r#"{"id":"dogecoin","symbol":"doge","name":"Dogecoin","current_price":0.1,
                "price_change_percentage_24h":-3.0,"sparkline_in_7d":{"price":[]}}"#,
        )
        .unwrap();
        let coin = row.into_coin().unwrap();

        assert_eq!(coin.price_change_percentage_24h, Some(-3.0));
        assert_eq!(coin.price_change_percentage_1h, None);
        assert_eq!(coin.sparkline_7d, None);
        assert_eq!(coin.market_cap, 0.0);
    }

    #[tokio::test]
    async fn empty_id_list_skips_the_request() {
        // unroutable base url: any request would fail
        let connector = CoinGeckoConnector::new(&ProviderConfig::new("http://127.0.0.1:9")).unwrap();
        let coins = connector
            .coins_by_ids(&[], &MarketQuery::default())
            .await
            .unwrap();
        assert!(coins.is_empty());
    }
}
