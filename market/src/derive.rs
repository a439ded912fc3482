//! Pure derivations over the base coin list.
//!
//! Everything here is a function of its arguments only, so the engine can
//! recompute all views after any input changes without invalidation logic.

use crate::config::DerivationRules;
use common::models::{Coin, FilterState, Segment, SortDirection, SortKey};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedViews {
    pub trending: Vec<Coin>,
    pub gainers: Vec<Coin>,
    pub losers: Vec<Coin>,
    pub favorites: Vec<Coin>,
    /// Segment, search and sort applied
    pub visible: Vec<Coin>,
}

pub fn derive_views(
    coins: &[Coin],
    favorite_ids: &BTreeSet<String>,
    filter: &FilterState,
    rules: &DerivationRules,
) -> DerivedViews {
    let trending = trending(coins, rules);
    let gainers = top_gainers(coins, rules.top_n);
    let losers = top_losers(coins, rules.top_n);
    let favorites = favorites(coins, favorite_ids);

    let base: &[Coin] = match filter.segment {
        Segment::All => coins,
        Segment::Trending => &trending,
        Segment::Gainers => &gainers,
        Segment::Losers => &losers,
        Segment::Favorites => &favorites,
    };
    let visible = visible_list(base, filter, rules);

    DerivedViews {
        trending,
        gainers,
        losers,
        favorites,
        visible,
    }
}

/// Highest 24h volume first, stablecoins excluded.
pub fn trending(coins: &[Coin], rules: &DerivationRules) -> Vec<Coin> {
    let mut candidates: Vec<Coin> = coins
        .iter()
        .filter(|c| {
            !rules
                .stablecoins
                .iter()
                .any(|s| s.eq_ignore_ascii_case(&c.symbol))
        })
        .cloned()
        .collect();
    sort_coins(&mut candidates, SortKey::Volume, SortDirection::Descending);
    candidates.truncate(rules.top_n);
    candidates
}

/// Largest 24h change first. Coins without a 24h change are left out.
pub fn top_gainers(coins: &[Coin], n: usize) -> Vec<Coin> {
    by_change(coins, n, SortDirection::Descending)
}

/// Smallest 24h change first. Coins without a 24h change are left out.
pub fn top_losers(coins: &[Coin], n: usize) -> Vec<Coin> {
    by_change(coins, n, SortDirection::Ascending)
}

fn by_change(coins: &[Coin], n: usize, direction: SortDirection) -> Vec<Coin> {
    let mut with_change: Vec<Coin> = coins
        .iter()
        .filter(|c| c.price_change_percentage_24h.is_some())
        .cloned()
        .collect();
    sort_coins(&mut with_change, SortKey::Change24h, direction);
    with_change.truncate(n);
    with_change
}

/// Base-list order is kept.
pub fn favorites(coins: &[Coin], favorite_ids: &BTreeSet<String>) -> Vec<Coin> {
    coins
        .iter()
        .filter(|c| favorite_ids.contains(&c.id))
        .cloned()
        .collect()
}

/// Search, then either the pinned default ordering or a stable sort.
pub fn visible_list(base: &[Coin], filter: &FilterState, rules: &DerivationRules) -> Vec<Coin> {
    let needle = filter.normalized_search();
    let mut list: Vec<Coin> = if needle.is_empty() {
        base.to_vec()
    } else {
        base.iter().filter(|c| c.matches(&needle)).cloned().collect()
    };

    if filter.is_default_view() {
        return pinned_first(list, &rules.pinned_symbols);
    }

    sort_coins(&mut list, filter.sort_key, filter.sort_direction);
    list
}

/// Pinned symbols in declared order, then everything else by market cap,
/// largest first.
pub fn pinned_first(coins: Vec<Coin>, pinned_symbols: &[String]) -> Vec<Coin> {
    let mut head = Vec::with_capacity(coins.len());
    let mut rest = coins;

    for symbol in pinned_symbols {
        let (matching, others): (Vec<Coin>, Vec<Coin>) = rest
            .into_iter()
            .partition(|c| c.symbol.eq_ignore_ascii_case(symbol));
        head.extend(matching);
        rest = others;
    }

    sort_coins(&mut rest, SortKey::MarketCap, SortDirection::Descending);
    head.extend(rest);
    head
}

/// Stable: coins with equal keys keep their relative order in both directions.
pub fn sort_coins(coins: &mut [Coin], key: SortKey, direction: SortDirection) {
    coins.sort_by(|a, b| {
        let ord = compare(a, b, key);
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

fn compare(a: &Coin, b: &Coin, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Price => a.current_price.total_cmp(&b.current_price),
        // missing change sorts below every reported change
        SortKey::Change24h => change_24h(a).total_cmp(&change_24h(b)),
        SortKey::Volume => a.total_volume.total_cmp(&b.total_volume),
        SortKey::MarketCap => a.market_cap.total_cmp(&b.market_cap),
    }
}

fn change_24h(coin: &Coin) -> f64 {
    coin.price_change_percentage_24h.unwrap_or(f64::NEG_INFINITY)
}
