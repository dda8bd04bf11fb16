use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use tracing::debug;

use crate::domain::{RawSymbolFilters, Side};

type HmacSha256 = Hmac<Sha256>;

/// Outcomes of talking to the exchange, pre-classified so the executor can
/// map them straight to HTTP-style statuses without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("Binance request limit hit ({status})")]
    RateLimited { status: u16 },
    #[error("Trade rejected: below Binance min_notional")]
    BelowMinNotional,
    #[error("Account has insufficient balance: {0}")]
    InsufficientBalance(String),
    #[error("Order failed: {message}")]
    Client { code: i64, message: String },
    #[error("Binance server error: {0}")]
    Server(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// The exchange surface the relay consumes. Injected everywhere so tests can
/// swap in a scripted double.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    async fn ticker_price(&self, symbol: &str) -> Result<Decimal, ExchangeError>;
    async fn symbol_filters(&self, symbol: &str) -> Result<RawSymbolFilters, ExchangeError>;
    /// Free balance per asset for the whole account.
    async fn account_balances(&self) -> Result<HashMap<String, Decimal>, ExchangeError>;
    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<serde_json::Value, ExchangeError>;
}

#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<ExchangeInfoSymbol>,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoSymbol {
    filters: Vec<ExchangeInfoFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeInfoFilter {
    filter_type: String,
    step_size: Option<String>,
    min_qty: Option<String>,
    min_notional: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Account {
    balances: Vec<AccountBalance>,
}

#[derive(Debug, Deserialize)]
struct AccountBalance {
    asset: String,
    free: Decimal,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: String,
}

/// Map a Binance failure to the relay's error taxonomy.
///
/// 418/429 and -1003 are IP bans / request-weight limits; -1013 covers filter
/// rejections (min notional); -2010 is the insufficient-balance race.
fn classify(status: u16, code: i64, msg: &str) -> ExchangeError {
    let m = msg.to_lowercase();
    if status == 418
        || status == 429
        || code == -1003
        || m.contains("too much request weight")
        || m.contains("banned")
    {
        return ExchangeError::RateLimited { status };
    }
    if code == -2010 || m.contains("insufficient balance") {
        return ExchangeError::InsufficientBalance(msg.to_string());
    }
    if code == -1013 || m.contains("notional") {
        return ExchangeError::BelowMinNotional;
    }
    if status >= 500 {
        return ExchangeError::Server(msg.to_string());
    }
    ExchangeError::Client {
        code,
        message: msg.to_string(),
    }
}

impl BinanceClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        recv_window_ms: u64,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            recv_window_ms,
            http: Client::new(),
        }
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn signed_query(&self, params: &[(&str, String)]) -> String {
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let ts = chrono::Utc::now().timestamp_millis();
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!(
            "recvWindow={}&timestamp={ts}",
            self.recv_window_ms
        ));
        let signature = self.sign(&query);
        format!("{query}&signature={signature}")
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ExchangeError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let err: ApiError = serde_json::from_str(&body).unwrap_or(ApiError {
            code: 0,
            msg: body.clone(),
        });
        debug!(status = status.as_u16(), code = err.code, msg = %err.msg, "binance.error");
        Err(classify(status.as_u16(), err.code, &err.msg))
    }
}

#[async_trait]
impl ExchangeApi for BinanceClient {
    async fn ticker_price(&self, symbol: &str) -> Result<Decimal, ExchangeError> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let resp = self.http.get(url).query(&[("symbol", symbol)]).send().await?;
        let resp = Self::check(resp).await?;
        let ticker: TickerPrice = resp.json().await?;
        Ok(ticker.price)
    }

    async fn symbol_filters(&self, symbol: &str) -> Result<RawSymbolFilters, ExchangeError> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let resp = self.http.get(url).query(&[("symbol", symbol)]).send().await?;
        let resp = Self::check(resp).await?;
        let info: ExchangeInfo = resp.json().await?;

        let mut raw = RawSymbolFilters::default();
        if let Some(sym) = info.symbols.into_iter().next() {
            for f in sym.filters {
                match f.filter_type.as_str() {
                    "LOT_SIZE" => {
                        raw.step_size = f.step_size;
                        raw.min_qty = f.min_qty;
                    }
                    "NOTIONAL" => raw.min_notional = f.min_notional,
                    _ => {}
                }
            }
        }
        Ok(raw)
    }

    async fn account_balances(&self) -> Result<HashMap<String, Decimal>, ExchangeError> {
        let query = self.signed_query(&[]);
        let url = format!("{}/api/v3/account?{query}", self.base_url);
        let resp = self
            .http
            .get(url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        let account: Account = resp.json().await?;
        Ok(account
            .balances
            .into_iter()
            .map(|b| (b.asset, b.free))
            .collect())
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<serde_json::Value, ExchangeError> {
        // quantity goes out as a string to avoid float precision on the wire
        let query = self.signed_query(&[
            ("symbol", symbol.to_string()),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.to_string()),
        ]);
        let url = format!("{}/api/v3/order?{query}", self.base_url);
        let resp = self
            .http
            .post(url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        let resp = Self::check(resp).await?;
        Ok(resp.json().await?)
    }
}
