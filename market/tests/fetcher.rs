mod support;

use common::{models::DataSource, Error};
use store::CacheKey;
use support::{sample_coins, sample_global, Harness};

#[tokio::test]
async fn network_success_is_cached() {
    let h = Harness::new();
    h.primary.always_markets(Ok(sample_coins()));
    let fetcher = h.fetcher(true);

    let fetched = fetcher.fetch_coin_markets().await.unwrap();
    assert_eq!(fetched.source, DataSource::Provider("primary".to_string()));
    assert_eq!(fetched.value.len(), 3);
    assert_eq!(h.primary.market_calls(), 1);

    let cached = fetcher.cached_coins().await.unwrap();
    assert_eq!(cached, fetched.value);
    assert!(h.cache().path_for(CacheKey::CoinMarkets).exists());
}

#[tokio::test]
async fn transient_failures_retry_then_serve_cache() {
    let h = Harness::new();
    h.primary.push_markets(Ok(sample_coins()));
    let fetcher = h.fetcher(true);
    fetcher.fetch_coin_markets().await.unwrap();

    h.primary
        .always_markets(Err(Error::TransientNetwork("connection reset".into())));
    let fetched = fetcher.fetch_coin_markets().await.unwrap();

    assert_eq!(fetched.source, DataSource::Cache);
    assert_eq!(fetched.value, sample_coins());
    // one success, then the initial attempt plus two retries
    assert_eq!(h.primary.market_calls(), 4);
    // cache hit means the secondary is never consulted
    assert_eq!(h.secondary.market_calls(), 0);
}

#[tokio::test]
async fn rate_limit_is_attempted_once() {
    let h = Harness::new();
    h.primary
        .always_markets(Err(Error::RateLimited("api.coingecko.com".into())));
    let fetcher = h.fetcher(false);

    let err = fetcher.fetch_coin_markets().await.unwrap_err();
    assert_eq!(err, Error::RateLimited("api.coingecko.com".into()));
    assert_eq!(h.primary.market_calls(), 1);
}

#[tokio::test]
async fn bad_status_is_not_retried() {
    let h = Harness::new();
    h.primary.always_markets(Err(Error::BadServerResponse(500)));
    let fetcher = h.fetcher(false);

    let err = fetcher.fetch_coin_markets().await.unwrap_err();
    assert_eq!(err, Error::BadServerResponse(500));
    assert_eq!(h.primary.market_calls(), 1);
}

#[tokio::test]
async fn offline_serves_cache_without_network() {
    let h = Harness::new();
    h.primary.always_markets(Ok(sample_coins()));
    let fetcher = h.fetcher(true);
    fetcher.fetch_coin_markets().await.unwrap();

    h.connectivity.set(false);
    let fetched = fetcher.fetch_coin_markets().await.unwrap();
    assert_eq!(fetched.source, DataSource::Cache);
    assert_eq!(h.primary.market_calls(), 1);
}

#[tokio::test]
async fn offline_without_cache_is_a_network_error() {
    let h = Harness::new();
    h.connectivity.set(false);
    let fetcher = h.fetcher(true);

    let err = fetcher.fetch_global_data().await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(h.primary.global_calls(), 0);
    assert_eq!(h.secondary.global_calls(), 0);
}

#[tokio::test]
async fn secondary_fills_in_and_is_deduplicated_by_symbol() {
    let h = Harness::new();
    h.primary.always_markets(Err(Error::BadServerResponse(503)));
    let mut rows = sample_coins();
    // same asset listed again under a bridged id
    rows.push(support::coin("weth-wrapped", "ETH", 3199.0, 1e6, 1e6, None));
    h.secondary.always_markets(Ok(rows));
    let fetcher = h.fetcher(true);

    let fetched = fetcher.fetch_coin_markets().await.unwrap();
    assert_eq!(fetched.source, DataSource::Provider("secondary".to_string()));
    let ids: Vec<&str> = fetched.value.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["bitcoin", "ethereum", "dogecoin"]);

    // the fallback result is cached like any other network success
    assert_eq!(fetcher.cached_coins().await.unwrap(), fetched.value);
}

#[tokio::test]
async fn whole_chain_failing_reports_the_primary_error() {
    let h = Harness::new();
    h.primary
        .always_markets(Err(Error::RateLimited("api.coingecko.com".into())));
    h.secondary.always_markets(Err(Error::BadServerResponse(502)));
    let fetcher = h.fetcher(true);

    let err = fetcher.fetch_coin_markets().await.unwrap_err();
    assert!(matches!(err, Error::RateLimited(_)));
    assert_eq!(h.secondary.market_calls(), 1);
}

#[tokio::test]
async fn global_snapshot_follows_the_same_chain() {
    let h = Harness::new();
    h.primary.push_global(Ok(sample_global()));
    let fetcher = h.fetcher(false);

    let fresh = fetcher.fetch_global_data().await.unwrap();
    assert_eq!(fresh.value.btc_dominance(), Some(52.0));

    h.primary.always_global(Err(Error::DecodeError("bad json".into())));
    let stale = fetcher.fetch_global_data().await.unwrap();
    assert_eq!(stale.source, DataSource::Cache);
    assert_eq!(stale.value, sample_global());
}

#[tokio::test]
async fn watchlist_skips_the_network_for_no_favorites() {
    let h = Harness::new();
    let fetcher = h.fetcher(false);

    let fetched = fetcher.fetch_watchlist(&[]).await.unwrap();
    assert!(fetched.value.is_empty());
    assert_eq!(h.primary.by_ids_calls(), 0);
}

#[tokio::test]
async fn watchlist_has_no_cache_fallback() {
    let h = Harness::new();
    h.primary.answer_by_ids(
        Err(Error::TransientNetwork("timeout".into())),
        std::time::Duration::ZERO,
    );
    let fetcher = h.fetcher(true);

    let err = fetcher
        .fetch_watchlist(&["bitcoin".to_string()])
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert_eq!(h.primary.by_ids_calls(), 3);
    assert_eq!(h.secondary.by_ids_calls(), 0);
}
