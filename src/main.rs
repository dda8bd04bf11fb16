use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use trade_relay::config::Config;
use trade_relay::exchange::BinanceClient;
use trade_relay::feed::PriceFeed;
use trade_relay::logger;
use trade_relay::market::{self, MarketData};
use trade_relay::store::RedisStore;

/// Cache daemon: primes and maintains the price/balance/filter caches that
/// the trade executor reads. The webhook layer embedding the executor runs
/// in its own process and shares state through Redis.
#[tokio::main]
async fn main() -> Result<()> {
    // Load local .env if present (no-op in prod/systemd envs)
    let _ = dotenvy::dotenv();

    logger::init_tracing();

    let cfg = Config::from_env()?;
    info!(
        api_url = %cfg.binance_api_url,
        ws_url = %cfg.binance_ws_url,
        symbols = cfg.symbols.len(),
        ws_price_cache = cfg.enable_ws_price_cache,
        filter_cache = cfg.enable_filter_cache,
        "boot"
    );

    let store = Arc::new(RedisStore::connect(&cfg.redis_url).await?);
    let api = Arc::new(BinanceClient::new(
        cfg.binance_api_url.clone(),
        cfg.binance_api_key.clone(),
        cfg.binance_api_secret.clone(),
        cfg.recv_window_ms,
    ));
    let market = Arc::new(
        MarketData::new(
            store.clone(),
            api,
            cfg.enable_ws_price_cache,
            cfg.enable_filter_cache,
            cfg.tz.clone(),
        )
        .with_ws_exclusions(&cfg.ws_excluded_symbols),
    );

    market::start_background_cache(
        market,
        cfg.symbols.clone(),
        cfg.balance_refresh_secs,
        cfg.filter_refresh_secs,
    )
    .await;

    if cfg.enable_ws_price_cache {
        // excluded pairs never get a feed; lookups for them go via REST
        let feed_symbols: Vec<String> = cfg
            .symbols
            .iter()
            .filter(|s| !cfg.ws_excluded_symbols.contains(s))
            .cloned()
            .collect();
        let feed = Arc::new(PriceFeed::new(
            store,
            cfg.binance_ws_url.clone(),
            cfg.tz.clone(),
        ));
        feed.start(
            feed_symbols,
            Duration::from_secs(cfg.ws_reconnect_grace_secs),
            Duration::from_secs(cfg.ws_check_interval_secs),
        )
        .await;
    }

    loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
        info!(symbols = cfg.symbols.len(), "relay.heartbeat");
        if let Err(e) = logger::append_line(&cfg.heartbeat_log_path, &logger::heartbeat_line()) {
            warn!(error = %e, "heartbeat.write_failed");
        }
    }
}
