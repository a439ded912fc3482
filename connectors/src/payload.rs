//! Provider response shapes and their normalization into canonical records.
//!
//! Each provider decodes into its own wire types; the variant is picked by
//! the connector that issued the request, never by inspecting the JSON.

use crate::coingecko::{GeckoGlobalEnvelope, GeckoMarket};
use crate::coinpaprika::{PaprikaGlobal, PaprikaTicker};
use common::models::{Coin, GlobalSnapshot};
use std::collections::HashSet;

/// Decoded coin-list response of one provider
#[derive(Debug)]
pub enum MarketsPayload {
    CoinGecko(Vec<GeckoMarket>),
    CoinPaprika {
        /// Quote currency the tickers were requested in
        currency: String,
        tickers: Vec<PaprikaTicker>,
    },
}

impl MarketsPayload {
    /// Canonical records in provider order. Rows without a usable price
    /// are dropped, as are repeated identifiers.
    pub fn into_coins(self) -> Vec<Coin> {
        let coins: Vec<Coin> = match self {
            MarketsPayload::CoinGecko(rows) => {
                rows.into_iter().filter_map(GeckoMarket::into_coin).collect()
            }
            MarketsPayload::CoinPaprika { currency, tickers } => {
                let mut coins: Vec<Coin> = tickers
                    .into_iter()
                    .filter_map(|t| t.into_coin(&currency))
                    .collect();
                // unranked tickers go last, ranked ones in rank order
                coins.sort_by_key(|c| c.market_cap_rank.unwrap_or(u32::MAX));
                coins
            }
        };
        dedup_by_id(coins)
    }
}

/// Decoded global-market response of one provider
#[derive(Debug)]
pub enum GlobalPayload {
    CoinGecko(GeckoGlobalEnvelope),
    CoinPaprika(PaprikaGlobal),
}

impl GlobalPayload {
    pub fn into_snapshot(self) -> GlobalSnapshot {
        match self {
            GlobalPayload::CoinGecko(envelope) => envelope.data.into_snapshot(),
            GlobalPayload::CoinPaprika(global) => global.into_snapshot(),
        }
    }
}

/// Keeps the first record for every identifier.
pub fn dedup_by_id(coins: Vec<Coin>) -> Vec<Coin> {
    let mut seen = HashSet::new();
    coins
        .into_iter()
        .filter(|c| seen.insert(c.id.clone()))
        .collect()
}

/// Keeps the first record for every ticker symbol (case-insensitive).
/// Used when a list comes from a source that lists the same asset on
/// several chains under different identifiers.
pub fn dedup_by_symbol(coins: Vec<Coin>) -> Vec<Coin> {
    let mut seen = HashSet::new();
    coins
        .into_iter()
        .filter(|c| seen.insert(c.symbol.to_uppercase()))
        .collect()
}
