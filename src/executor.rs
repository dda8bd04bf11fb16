use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::domain::{ResponseBody, Side, Sizing, TradeIntent, TradeResponse};
use crate::exchange::{ExchangeApi, ExchangeError};
use crate::journal::OrderJournal;
use crate::market::MarketData;
use crate::quantize::quantize_down;
use crate::resolver::resolve_trade_amount;
use crate::symbol::split_symbol;
use crate::validator::validate_order_qty;

/// Orchestrates one webhook-triggered trade end to end:
/// price -> filters -> asset split -> balance -> amount -> quantity ->
/// validation -> order placement -> post-trade balance patch.
///
/// Every terminal branch records an order attempt. Only the price lookup is
/// retried (once); everything else fails closed immediately to keep webhook
/// latency bounded.
pub struct TradeExecutor {
    market: Arc<MarketData>,
    api: Arc<dyn ExchangeApi>,
    journal: OrderJournal,
    price_retry_delay: Duration,
    /// Serializes PlaceOrder + balance patch so orders settle one at a time
    /// and each patch lands before the next placement. Sizing still happens
    /// outside the lock, so two intents can size against the same snapshot;
    /// the exchange's own insufficient-balance rejection backstops that.
    order_lock: tokio::sync::Mutex<()>,
}

impl TradeExecutor {
    pub fn new(
        market: Arc<MarketData>,
        api: Arc<dyn ExchangeApi>,
        journal: OrderJournal,
        price_retry_delay: Duration,
    ) -> Self {
        Self {
            market,
            api,
            journal,
            price_retry_delay,
            order_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Boundary entry point for raw webhook sizing fields. An invalid field
    /// combination is journaled with unknown qty/price and rejected before
    /// any market lookup happens, so bad intents stay auditable too.
    pub async fn execute_from_parts(
        &self,
        symbol: &str,
        side: Side,
        percentage: Option<Decimal>,
        amount: Option<Decimal>,
        amount_is_base: bool,
        amount_is_quote: bool,
    ) -> TradeResponse {
        match Sizing::from_parts(percentage, amount, amount_is_base, amount_is_quote) {
            Ok(sizing) => self.execute(&TradeIntent::new(symbol, side, sizing)).await,
            Err(e) => {
                let symbol = symbol.trim().to_uppercase();
                let message = e.to_string();
                warn!(symbol = %symbol, "{message}");
                self.journal
                    .record(&symbol, side.as_str(), None, None, "error", &message)
                    .await;
                TradeResponse::new(ResponseBody::error(message), 200)
            }
        }
    }

    pub async fn execute(&self, intent: &TradeIntent) -> TradeResponse {
        info!(
            symbol = %intent.symbol,
            side = %intent.side,
            sizing = ?intent.sizing,
            "executor.run"
        );

        // === 1. Price retrieval (with one retry) ===
        let symbol = intent.symbol.as_str();
        let side = intent.side;
        let mut price = self.market.current_price(symbol).await;
        if price.is_none() {
            info!(symbol, delay = ?self.price_retry_delay, "executor.price_retry");
            tokio::time::sleep(self.price_retry_delay).await;
            price = self.market.current_price(symbol).await;
        }
        let Some(price) = price else {
            let message = format!("No price available for {symbol}. Aborting trade.");
            warn!("{message}");
            self.record_error(intent, None, None, &message).await;
            return TradeResponse::new(ResponseBody::error(message), 200);
        };

        // === 2. Filters ===
        let Some(filters) = self.market.symbol_filters(symbol).await else {
            let message = format!("Filters unavailable for {symbol}");
            warn!("{message}");
            self.record_error(intent, None, Some(price), &message).await;
            return TradeResponse::new(ResponseBody::error(message), 200);
        };

        // === 3. Determine assets ===
        let (base_asset, quote_asset) = match split_symbol(symbol) {
            Ok(split) => split,
            Err(e) => {
                let message = format!("Failed to parse base/quote assets for {symbol}: {e}");
                error!("{message}");
                self.record_error(intent, None, Some(price), &message).await;
                return TradeResponse::new(ResponseBody::error(message), 400);
            }
        };

        // === 4. Balance ===
        let balance_asset = match side {
            Side::Buy => &quote_asset,
            Side::Sell => &base_asset,
        };
        let balances = self.market.balances().await;
        let free_balance = balances
            .get(balance_asset)
            .copied()
            .unwrap_or(Decimal::ZERO);
        if free_balance <= Decimal::ZERO {
            let message = format!(
                "No available {balance_asset} balance to {}.",
                side.as_str().to_lowercase()
            );
            warn!("{message}");
            self.record_error(intent, None, Some(price), &message).await;
            return TradeResponse::new(ResponseBody::warning(message), 200);
        }

        // === 5. Resolve amount ===
        let target_amount =
            match resolve_trade_amount(side, free_balance, &intent.sizing, Some(price)) {
                Ok(amount) => amount,
                Err(e) => {
                    let message = e.to_string();
                    warn!(symbol, "{message}");
                    self.record_error(intent, None, Some(price), &message).await;
                    return TradeResponse::new(ResponseBody::error(message), 200);
                }
            };

        // === 6. Compute quantity ===
        let raw_qty = match (side, &intent.sizing) {
            // buy-by-base is already an order quantity; everything else on
            // the buy side is quote-denominated and converts via price
            (Side::Buy, Sizing::BaseAmount(_)) => target_amount,
            (Side::Buy, _) => target_amount / price,
            // the resolver hands sell targets back in base units
            (Side::Sell, _) => target_amount,
        };
        let qty = quantize_down(raw_qty, filters.step_size);
        info!(
            symbol,
            side = %side,
            qty = %qty,
            price = %price,
            notional = %(qty * price),
            "executor.quantity"
        );

        // === 7. Validate against filters ===
        if let Err(reason) = validate_order_qty(qty, price, &filters) {
            let message = reason.to_string();
            warn!(symbol, "{message}");
            self.record_error(intent, Some(qty), Some(price), &message)
                .await;
            return TradeResponse::new(ResponseBody::warning(message), 200);
        }

        // === 8. Place order, patch balances ===
        self.place_and_settle(intent, qty, price, &base_asset, &quote_asset)
            .await
    }

    async fn place_and_settle(
        &self,
        intent: &TradeIntent,
        qty: Decimal,
        price: Decimal,
        base_asset: &str,
        quote_asset: &str,
    ) -> TradeResponse {
        let symbol = intent.symbol.as_str();
        let side = intent.side;

        let _guard = self.order_lock.lock().await;
        match self.api.place_market_order(symbol, side, qty).await {
            Ok(order) => {
                info!(symbol, side = %side, qty = %qty, price = %price, "executor.order_executed");

                // The trade already happened; a failed patch only costs
                // cache freshness, not correctness.
                self.market
                    .refresh_balances_for_assets(&[base_asset.to_string(), quote_asset.to_string()])
                    .await;

                let message = format!("Order executed successfully ({symbol} {side})");
                self.journal
                    .record(symbol, side.as_str(), Some(qty), Some(price), "success", &message)
                    .await;

                let status = format!("spot_{}_executed", side.as_str().to_lowercase());
                TradeResponse::new(ResponseBody::executed(status, order), 200)
            }
            Err(e) => {
                let (body, status) = classify_order_failure(&e);
                warn!(symbol, side = %side, error = %e, http = status, "executor.order_failed");
                let message = body
                    .error
                    .clone()
                    .unwrap_or_else(|| "Unknown failure".to_string());
                self.record_error(intent, Some(qty), Some(price), &message)
                    .await;
                TradeResponse::new(body, status)
            }
        }
    }

    async fn record_error(
        &self,
        intent: &TradeIntent,
        qty: Option<Decimal>,
        price: Option<Decimal>,
        message: &str,
    ) {
        self.journal
            .record(
                &intent.symbol,
                intent.side.as_str(),
                qty,
                price,
                "error",
                message,
            )
            .await;
    }
}

/// Map an exchange failure to a response body and HTTP-style status.
///
/// An insufficient-balance rejection is a race against other spenders, not a
/// caller bug, so it stays success-shaped like the other expected outcomes.
fn classify_order_failure(e: &ExchangeError) -> (ResponseBody, u16) {
    match e {
        ExchangeError::RateLimited { .. } => (ResponseBody::error(e.to_string()), 429),
        ExchangeError::BelowMinNotional => (ResponseBody::error(e.to_string()), 400),
        ExchangeError::InsufficientBalance(_) => (ResponseBody::error(e.to_string()), 200),
        ExchangeError::Client { .. } => (ResponseBody::error(e.to_string()), 400),
        ExchangeError::Server(_) => (ResponseBody::error("Binance server error"), 502),
        ExchangeError::Transport(_) => {
            (ResponseBody::error(format!("Unexpected order error: {e}")), 500)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_failure_status_mapping() {
        let cases: Vec<(ExchangeError, u16)> = vec![
            (ExchangeError::RateLimited { status: 429 }, 429),
            (ExchangeError::BelowMinNotional, 400),
            (
                ExchangeError::InsufficientBalance("race".to_string()),
                200,
            ),
            (
                ExchangeError::Client {
                    code: -1102,
                    message: "bad param".to_string(),
                },
                400,
            ),
            (ExchangeError::Server("boom".to_string()), 502),
        ];
        for (err, expected) in cases {
            let (body, status) = classify_order_failure(&err);
            assert_eq!(status, expected, "{err}");
            assert!(body.error.is_some());
        }
    }
}
