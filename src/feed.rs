use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::market::{LAST_REFRESH_PRICES_KEY, PRICE_CACHE_KEY};
use crate::store::KvStore;
use crate::time::now_local_ts;

/// Minimum gap between cache writes per symbol; bookTicker fires far more
/// often than a webhook ever reads.
const UPDATE_THROTTLE: Duration = Duration::from_secs(3);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const STAGGER_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct BookTicker {
    #[serde(rename = "s")]
    symbol: Option<String>,
    #[serde(rename = "b")]
    bid: Option<Decimal>,
    #[serde(rename = "a")]
    ask: Option<Decimal>,
}

/// One websocket per tracked symbol, plus a watchdog that restarts any feed
/// silent for longer than the grace window.
pub struct PriceFeed {
    store: Arc<dyn KvStore>,
    ws_base: String,
    tz: String,
    last_seen: Arc<Mutex<HashMap<String, Instant>>>,
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl PriceFeed {
    pub fn new(store: Arc<dyn KvStore>, ws_base: impl Into<String>, tz: impl Into<String>) -> Self {
        Self {
            store,
            ws_base: ws_base.into().trim_end_matches('/').to_string(),
            tz: tz.into(),
            last_seen: Arc::new(Mutex::new(HashMap::new())),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Start one feed task per symbol (staggered to avoid a connection-rate
    /// burst) and the supervising watchdog.
    pub async fn start(self: &Arc<Self>, symbols: Vec<String>, grace: Duration, check_interval: Duration) {
        for symbol in &symbols {
            self.spawn_feed(symbol);
            tokio::time::sleep(STAGGER_DELAY).await;
        }
        info!(count = symbols.len(), "feed.started");

        let feed = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(check_interval);
            loop {
                tick.tick().await;
                feed.restart_stale(&symbols, grace);
            }
        });
    }

    fn spawn_feed(self: &Arc<Self>, symbol: &str) {
        let symbol = symbol.to_uppercase();
        self.last_seen
            .lock()
            .expect("last_seen lock")
            .insert(symbol.clone(), Instant::now());

        let feed = Arc::clone(self);
        let sym = symbol.clone();
        let handle = tokio::spawn(async move { feed.run_feed(sym).await });
        self.handles
            .lock()
            .expect("handles lock")
            .insert(symbol, handle);
    }

    fn restart_stale(self: &Arc<Self>, symbols: &[String], grace: Duration) {
        for symbol in symbols {
            let symbol = symbol.to_uppercase();
            let stale = self
                .last_seen
                .lock()
                .expect("last_seen lock")
                .get(&symbol)
                .map_or(true, |seen| seen.elapsed() > grace);
            if !stale {
                continue;
            }
            warn!(symbol = %symbol, grace_secs = grace.as_secs(), "feed.stale, restarting");
            if let Some(handle) = self.handles.lock().expect("handles lock").remove(&symbol) {
                handle.abort();
            }
            self.spawn_feed(&symbol);
        }
    }

    async fn run_feed(&self, symbol: String) {
        let url = format!("{}/{}@bookTicker", self.ws_base, symbol.to_lowercase());
        let mut last_saved: Option<Instant> = None;

        loop {
            let (mut ws, _) = match connect_async(url.as_str()).await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "feed.connect_failed, retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                }
            };
            debug!(symbol = %symbol, "feed.connected");

            while let Some(msg) = ws.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        self.mark_seen(&symbol);
                        if last_saved.is_some_and(|t| t.elapsed() < UPDATE_THROTTLE) {
                            continue;
                        }
                        if self.save_tick(&symbol, &text).await {
                            last_saved = Some(Instant::now());
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        self.mark_seen(&symbol);
                        if ws.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }

            warn!(symbol = %symbol, "feed.disconnected, reconnecting");
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    fn mark_seen(&self, symbol: &str) {
        self.last_seen
            .lock()
            .expect("last_seen lock")
            .insert(symbol.to_string(), Instant::now());
    }

    async fn save_tick(&self, symbol: &str, text: &str) -> bool {
        let tick: BookTicker = match serde_json::from_str(text) {
            Ok(t) => t,
            Err(e) => {
                debug!(symbol, error = %e, "feed.unparseable_message");
                return false;
            }
        };
        let (Some(sym), Some(bid), Some(ask)) = (tick.symbol, tick.bid, tick.ask) else {
            return false;
        };
        // a one-sided book streams "0" for the empty side; never cache that
        if bid <= Decimal::ZERO || ask <= Decimal::ZERO {
            debug!(symbol, bid = %bid, ask = %ask, "feed.one_sided_book_skipped");
            return false;
        }

        let mid = (bid + ask) / dec!(2);
        if let Err(e) = self
            .store
            .hset(PRICE_CACHE_KEY, &sym.to_uppercase(), &mid.to_string())
            .await
        {
            warn!(symbol, error = %e, "feed.cache_write_failed");
            return false;
        }
        let ts = now_local_ts(&self.tz).to_string();
        if let Err(e) = self.store.set(LAST_REFRESH_PRICES_KEY, &ts).await {
            warn!(error = %e, "feed.refresh_marker_failed");
        }
        debug!(symbol = %sym, price = %mid, "feed.tick");
        true
    }
}
