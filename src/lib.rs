//! Webhook-triggered spot trade relay.
//!
//! The core is [`executor::TradeExecutor`]: it takes a validated
//! [`domain::TradeIntent`], resolves the trade size against cached
//! account/market state, and forwards a MARKET order to Binance. The
//! [`market::MarketData`] layer serves cached prices, balances and filters
//! with single REST fallbacks; [`feed::PriceFeed`] keeps the price cache warm
//! from bookTicker streams. The upstream webhook/HTTP layer lives outside
//! this crate and hands intents in already authenticated and parsed.

pub mod config;
pub mod domain;
pub mod exchange;
pub mod executor;
pub mod feed;
pub mod journal;
pub mod logger;
pub mod market;
pub mod quantize;
pub mod resolver;
pub mod store;
pub mod symbol;
pub mod time;
pub mod validator;
