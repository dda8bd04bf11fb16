use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::exchange::ExchangeApi;
use crate::domain::SymbolFilters;
use crate::quantize::sanitize_filters;
use crate::store::KvStore;
use crate::symbol::split_symbol;
use crate::time::now_local_ts;

pub const PRICE_CACHE_KEY: &str = "price_cache";
pub const BALANCES_KEY: &str = "account_balances";
pub const LAST_REFRESH_PRICES_KEY: &str = "last_refresh_prices";
pub const LAST_REFRESH_BALANCES_KEY: &str = "last_refresh_balances";
pub const LAST_REFRESH_FILTERS_KEY: &str = "last_refresh_filters";

const STABLECOINS: [&str; 2] = ["USDT", "USDC"];

pub fn filters_key(symbol: &str) -> String {
    format!("filters:{}", symbol.to_uppercase())
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BalanceSnapshot {
    balances: HashMap<String, Decimal>,
    ts: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct FilterEntry {
    filters: SymbolFilters,
    ts: f64,
}

/// Cache-first, REST-fallback access to price, balance and filter state.
///
/// Every live-query path swallows exchange and store errors: the cache is
/// allowed to degrade to "unknown" but never to crash a caller mid-trade.
pub struct MarketData {
    store: Arc<dyn KvStore>,
    api: Arc<dyn ExchangeApi>,
    ws_price_cache: bool,
    filter_cache: bool,
    ws_excluded: HashSet<String>,
    tz: String,
}

impl MarketData {
    pub fn new(
        store: Arc<dyn KvStore>,
        api: Arc<dyn ExchangeApi>,
        ws_price_cache: bool,
        filter_cache: bool,
        tz: impl Into<String>,
    ) -> Self {
        Self {
            store,
            api,
            ws_price_cache,
            filter_cache,
            ws_excluded: HashSet::new(),
            tz: tz.into(),
        }
    }

    /// Symbols whose streamed prices are known-bad (thin books, delisted
    /// pairs); lookups for these always go straight to REST.
    pub fn with_ws_exclusions(mut self, symbols: &[String]) -> Self {
        self.ws_excluded = symbols.iter().map(|s| s.to_uppercase()).collect();
        self
    }

    fn now_ts(&self) -> f64 {
        now_local_ts(&self.tz)
    }

    // ---- Price ----

    /// Last streamed mid-price, if any. A non-positive or unparseable cache
    /// entry counts as missing; a one-sided book can stream a "0" side.
    pub async fn cached_price(&self, symbol: &str) -> Option<Decimal> {
        let raw = match self.store.hget(PRICE_CACHE_KEY, &symbol.to_uppercase()).await {
            Ok(v) => v?,
            Err(e) => {
                warn!(symbol, error = %e, "price.cache_read_failed");
                return None;
            }
        };
        match Decimal::from_str(&raw) {
            Ok(p) if p > Decimal::ZERO => Some(p),
            _ => {
                warn!(symbol, raw = %raw, "price.cache_unusable");
                None
            }
        }
    }

    /// Cached price with a single REST fallback. Never raises; `None` means
    /// the pipeline should abort with "no price available".
    pub async fn current_price(&self, symbol: &str) -> Option<Decimal> {
        if !self.ws_price_cache {
            info!(symbol, "price.rest_only (stream cache disabled)");
            return self.fetch_price_rest(symbol).await;
        }
        if self.ws_excluded.contains(symbol.to_uppercase().as_str()) {
            info!(symbol, "price.rest_only (symbol excluded from stream cache)");
            return self.fetch_price_rest(symbol).await;
        }
        if let Some(price) = self.cached_price(symbol).await {
            return Some(price);
        }
        info!(symbol, "price.rest_fallback (cache empty)");
        self.fetch_price_rest(symbol).await
    }

    async fn fetch_price_rest(&self, symbol: &str) -> Option<Decimal> {
        // A stable/stable pair has no real ticker; pin it to 1.
        if let Ok((base, quote)) = split_symbol(symbol) {
            if STABLECOINS.contains(&base.as_str()) && STABLECOINS.contains(&quote.as_str()) {
                return Some(Decimal::ONE);
            }
        }
        match self.api.ticker_price(symbol).await {
            Ok(price) if price > Decimal::ZERO => Some(price),
            Ok(price) => {
                warn!(symbol, %price, "price.rest_non_positive");
                None
            }
            Err(e) => {
                warn!(symbol, error = %e, "price.rest_failed");
                None
            }
        }
    }

    // ---- Balances ----

    /// Cached full balance snapshot; cold cache falls back to one live
    /// account query. Empty map means balances are currently unknown.
    pub async fn balances(&self) -> HashMap<String, Decimal> {
        match self.cached_balances().await {
            Some(cached) if !cached.is_empty() => cached,
            _ => {
                warn!("balances.cache_empty, fetching via REST");
                self.fetch_and_cache_balances().await
            }
        }
    }

    async fn cached_balances(&self) -> Option<HashMap<String, Decimal>> {
        let raw = match self.store.get(BALANCES_KEY).await {
            Ok(v) => v?,
            Err(e) => {
                warn!(error = %e, "balances.cache_read_failed");
                return None;
            }
        };
        serde_json::from_str::<BalanceSnapshot>(&raw)
            .map(|s| s.balances)
            .ok()
    }

    /// Full account refresh: fetch, keep free balances > 0, cache. The
    /// refresh timestamp is bumped even when the fetch fails so the
    /// dashboard can tell "tried and failed" from "never ran".
    pub async fn fetch_and_cache_balances(&self) -> HashMap<String, Decimal> {
        let result = match self.api.account_balances().await {
            Ok(all) => {
                let balances: HashMap<String, Decimal> = all
                    .into_iter()
                    .filter(|(_, free)| *free > Decimal::ZERO)
                    .collect();
                let snapshot = BalanceSnapshot {
                    balances: balances.clone(),
                    ts: self.now_ts(),
                };
                if let Ok(payload) = serde_json::to_string(&snapshot) {
                    if let Err(e) = self.store.set(BALANCES_KEY, &payload).await {
                        warn!(error = %e, "balances.cache_write_failed");
                    }
                }
                info!(assets = balances.len(), "balances.refreshed");
                balances
            }
            Err(e) => {
                warn!(error = %e, "balances.rest_failed");
                HashMap::new()
            }
        };
        self.bump(LAST_REFRESH_BALANCES_KEY).await;
        result
    }

    /// Post-trade incremental patch: live-query the account but rewrite only
    /// the named assets into the existing snapshot, so the hot path never
    /// pays for a full resync.
    pub async fn refresh_balances_for_assets(&self, assets: &[String]) {
        let all = match self.api.account_balances().await {
            Ok(all) => all,
            Err(e) => {
                warn!(?assets, error = %e, "balances.patch_fetch_failed");
                return;
            }
        };

        let mut snapshot = match self.store.get(BALANCES_KEY).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            Ok(None) => BalanceSnapshot::default(),
            Err(e) => {
                warn!(error = %e, "balances.patch_read_failed");
                BalanceSnapshot::default()
            }
        };

        for asset in assets {
            if let Some(free) = all.get(asset) {
                snapshot.balances.insert(asset.clone(), *free);
                info!(asset = %asset, free = %free, "balances.patched");
            }
        }
        snapshot.ts = self.now_ts();

        match serde_json::to_string(&snapshot) {
            Ok(payload) => {
                if let Err(e) = self.store.set(BALANCES_KEY, &payload).await {
                    warn!(error = %e, "balances.patch_write_failed");
                }
            }
            Err(e) => warn!(error = %e, "balances.patch_serialize_failed"),
        }
    }

    // ---- Filters ----

    /// Trading filters for a symbol: cache first, one fetch-and-cache
    /// fallback, then a final cache re-read.
    pub async fn symbol_filters(&self, symbol: &str) -> Option<SymbolFilters> {
        if !self.filter_cache {
            info!(symbol, "filters.rest_only (filter cache disabled)");
            self.fetch_and_cache_filters(&[symbol.to_string()]).await;
            return self.cached_filters(symbol).await;
        }

        if let Some(filters) = self.cached_filters(symbol).await {
            return Some(filters);
        }

        info!(symbol, "filters.rest_fallback (cache empty)");
        self.fetch_and_cache_filters(&[symbol.to_string()]).await;
        self.cached_filters(symbol).await
    }

    async fn cached_filters(&self, symbol: &str) -> Option<SymbolFilters> {
        let raw = match self.store.get(&filters_key(symbol)).await {
            Ok(v) => v?,
            Err(e) => {
                warn!(symbol, error = %e, "filters.cache_read_failed");
                return None;
            }
        };
        serde_json::from_str::<FilterEntry>(&raw).map(|e| e.filters).ok()
    }

    /// Fetch, sanitize and cache filters for the given symbols. Per-symbol
    /// failures are isolated so one bad pair cannot starve the rest.
    pub async fn fetch_and_cache_filters(&self, symbols: &[String]) {
        let ts = self.now_ts();
        for symbol in symbols {
            match self.api.symbol_filters(symbol).await {
                Ok(raw) => {
                    let entry = FilterEntry {
                        filters: sanitize_filters(&raw),
                        ts,
                    };
                    match serde_json::to_string(&entry) {
                        Ok(payload) => {
                            if let Err(e) = self.store.set(&filters_key(symbol), &payload).await {
                                warn!(symbol, error = %e, "filters.cache_write_failed");
                            }
                        }
                        Err(e) => warn!(symbol, error = %e, "filters.serialize_failed"),
                    }
                }
                Err(e) => warn!(symbol, error = %e, "filters.rest_failed"),
            }
        }
        self.bump(LAST_REFRESH_FILTERS_KEY).await;
    }

    async fn bump(&self, key: &str) {
        let ts = self.now_ts().to_string();
        if let Err(e) = self.store.set(key, &ts).await {
            warn!(key, error = %e, "refresh_marker_write_failed");
        }
    }
}

/// Prime the caches once, then keep balances (hourly by default) and filters
/// (daily by default) fresh in the background. Each loop isolates its own
/// failures; a broken refresh never halts the sibling loops.
pub async fn start_background_cache(
    market: Arc<MarketData>,
    symbols: Vec<String>,
    balance_refresh_secs: u64,
    filter_refresh_secs: u64,
) {
    info!("cache.priming");
    market.fetch_and_cache_balances().await;
    market.fetch_and_cache_filters(&symbols).await;

    {
        let market = Arc::clone(&market);
        tokio::spawn(async move {
            let mut tick =
                tokio::time::interval(std::time::Duration::from_secs(balance_refresh_secs));
            tick.tick().await; // first tick fires immediately; priming already ran
            loop {
                tick.tick().await;
                market.fetch_and_cache_balances().await;
            }
        });
    }

    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_secs(filter_refresh_secs));
        tick.tick().await;
        loop {
            tick.tick().await;
            market.fetch_and_cache_filters(&symbols).await;
        }
    });

    info!("cache.background_loops_started");
}
