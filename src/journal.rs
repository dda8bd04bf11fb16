use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::store::KvStore;
use crate::time::now_local_ts;

pub const ORDER_LOG_KEY: &str = "order_log";

/// One row per trade attempt, success or failure, read by the ops dashboard.
/// Quantity/price are "?" when the pipeline failed before knowing them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAttemptRecord {
    pub symbol: String,
    pub side: String,
    pub qty: String,
    pub price: String,
    pub status: String,
    pub message: String,
    pub ts: f64,
}

/// Best-effort order-attempt log. A failed write must never block or change
/// a trade outcome, so every error lands in the log stream and nowhere else.
#[derive(Clone)]
pub struct OrderJournal {
    store: Arc<dyn KvStore>,
    tz: String,
}

impl OrderJournal {
    pub fn new(store: Arc<dyn KvStore>, tz: impl Into<String>) -> Self {
        Self {
            store,
            tz: tz.into(),
        }
    }

    pub async fn record(
        &self,
        symbol: &str,
        side: &str,
        qty: Option<Decimal>,
        price: Option<Decimal>,
        status: &str,
        message: &str,
    ) {
        let record = OrderAttemptRecord {
            symbol: symbol.to_string(),
            side: side.to_string(),
            qty: qty.map_or_else(|| "?".to_string(), |q| q.to_string()),
            price: price.map_or_else(|| "?".to_string(), |p| p.to_string()),
            status: status.to_string(),
            message: message.to_string(),
            ts: now_local_ts(&self.tz),
        };

        let payload = match serde_json::to_string(&record) {
            Ok(p) => p,
            Err(e) => {
                warn!(symbol, error = %e, "journal.serialize_failed");
                return;
            }
        };
        if let Err(e) = self.store.hset(ORDER_LOG_KEY, symbol, &payload).await {
            warn!(symbol, error = %e, "journal.write_failed");
        }
    }
}
