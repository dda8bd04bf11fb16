use thiserror::Error;

/// Quote tickers we know how to strip off a pair, most specific first.
/// 4-letter quotes must come before 3-letter ones so e.g. a symbol ending in
/// "TUSDT" parses as ...T/USDT rather than matching a shorter suffix.
const KNOWN_QUOTES: [&str; 5] = ["USDT", "USDC", "BTC", "ETH", "BNB"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("Unknown quote asset in symbol: {0}")]
    UnknownQuote(String),
    #[error("Empty base asset in symbol: {0}")]
    EmptyBase(String),
}

/// Split a pair like "BTCUSDT" into ("BTC", "USDT").
pub fn split_symbol(symbol: &str) -> Result<(String, String), SymbolError> {
    for quote in KNOWN_QUOTES {
        if let Some(base) = symbol.strip_suffix(quote) {
            if base.is_empty() {
                return Err(SymbolError::EmptyBase(symbol.to_string()));
            }
            return Ok((base.to_string(), quote.to_string()));
        }
    }
    Err(SymbolError::UnknownQuote(symbol.to_string()))
}
