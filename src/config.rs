use anyhow::{anyhow, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // Exchange
    pub binance_api_url: String,
    pub binance_ws_url: String,
    // secrets; keep out of logs
    pub binance_api_key: String,
    pub binance_api_secret: String,
    pub recv_window_ms: u64,

    // Cache store
    pub redis_url: String,

    // Tracked pairs
    pub symbols: Vec<String>,
    pub ws_excluded_symbols: Vec<String>,

    // Cache behavior
    pub enable_ws_price_cache: bool,
    pub enable_filter_cache: bool,
    pub balance_refresh_secs: u64,
    pub filter_refresh_secs: u64,

    // Price feed watchdog
    pub ws_reconnect_grace_secs: u64,
    pub ws_check_interval_secs: u64,

    // Executor
    pub price_retry_delay_secs: u64,

    // Runtime
    pub tz: String,
    pub heartbeat_log_path: String,
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|s| s.trim().to_lowercase()) {
        None => default,
        Some(v) if v.is_empty() => default,
        Some(v) if v == "1" || v == "true" || v == "yes" || v == "y" || v == "on" => true,
        Some(v) if v == "0" || v == "false" || v == "no" || v == "n" || v == "off" => false,
        Some(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|x| x.parse().ok())
}

const DEFAULT_SYMBOLS: &str = "BTCUSDT,ETHUSDT,ADAUSDT,DOGEUSDT,PEPEUSDT,XRPUSDT,WIFUSDT,BNBUSDT,SOLUSDT,\
BTCUSDC,ETHUSDC,ADAUSDC,DOGEUSDC,PEPEUSDC,XRPUSDC,WIFUSDC,BNBUSDC,SOLUSDC";

impl Config {
    pub fn from_env() -> Result<Self> {
        // Exchange
        let binance_api_url = std::env::var("BINANCE_API_URL")
            .unwrap_or_else(|_| "https://api.binance.com".to_string());
        let binance_ws_url = std::env::var("BINANCE_WS_URL")
            .unwrap_or_else(|_| "wss://stream.binance.com:9443/ws".to_string());
        let binance_api_key = std::env::var("BINANCE_API_KEY")
            .map_err(|_| anyhow!("BINANCE_API_KEY is required"))?;
        let binance_api_secret = std::env::var("BINANCE_API_SECRET")
            .map_err(|_| anyhow!("BINANCE_API_SECRET is required"))?;
        let recv_window_ms = env_parse::<u64>("BINANCE_RECV_WINDOW_MS").unwrap_or(5000);

        // Cache store
        let redis_url = std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        // Tracked pairs
        let symbols: Vec<String> = std::env::var("RELAY_SYMBOLS")
            .unwrap_or_else(|_| DEFAULT_SYMBOLS.to_string())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            return Err(anyhow!("RELAY_SYMBOLS must name at least one pair"));
        }
        let ws_excluded_symbols: Vec<String> = std::env::var("WS_EXCLUDED_SYMBOLS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        // Cache behavior
        let enable_ws_price_cache = env_bool("ENABLE_WS_PRICE_CACHE", true);
        let enable_filter_cache = env_bool("ENABLE_FILTER_CACHE", true);
        let balance_refresh_secs = env_parse::<u64>("BALANCE_REFRESH_SECS").unwrap_or(3600);
        let filter_refresh_secs = env_parse::<u64>("FILTER_REFRESH_SECS").unwrap_or(24 * 3600);

        // Price feed watchdog
        let ws_reconnect_grace_secs = env_parse::<u64>("WS_RECONNECT_GRACE_SECS").unwrap_or(60);
        let ws_check_interval_secs = env_parse::<u64>("WS_CHECK_INTERVAL_SECS").unwrap_or(30);

        // Executor
        let price_retry_delay_secs = env_parse::<u64>("PRICE_RETRY_DELAY_SECS").unwrap_or(3);

        if balance_refresh_secs == 0 || filter_refresh_secs == 0 {
            return Err(anyhow!("refresh intervals must be positive"));
        }

        // Runtime
        let tz = std::env::var("RELAY_TZ").unwrap_or_else(|_| "Europe/Zurich".to_string());
        let heartbeat_log_path =
            std::env::var("RELAY_HEARTBEAT_LOG").unwrap_or_else(|_| "./heartbeat.log".to_string());

        Ok(Self {
            binance_api_url,
            binance_ws_url,
            binance_api_key,
            binance_api_secret,
            recv_window_ms,
            redis_url,
            symbols,
            ws_excluded_symbols,
            enable_ws_price_cache,
            enable_filter_cache,
            balance_refresh_secs,
            filter_refresh_secs,
            ws_reconnect_grace_secs,
            ws_check_interval_secs,
            price_retry_delay_secs,
            tz,
            heartbeat_log_path,
        })
    }

    pub fn price_retry_delay(&self) -> Duration {
        Duration::from_secs(self.price_retry_delay_secs)
    }
}
