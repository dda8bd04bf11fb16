use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Spot,
}

/// How the caller sized the trade. Built once at the input boundary; the
/// six mutually-exclusive webhook fields collapse into exactly one variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Sizing {
    /// Fraction in (0, 1] of the free balance of the relevant side's asset
    /// (quote balance for BUY, base balance for SELL).
    Percentage(Decimal),
    /// Explicit amount in base-asset units (e.g. buy/sell 5 ADA).
    BaseAmount(Decimal),
    /// Explicit amount in quote-asset units (e.g. spend 10 USDT).
    QuoteAmount(Decimal),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SizingError {
    #[error("Neither amount nor percentage provided")]
    Missing,
    #[error("Provide either a percentage or an amount, not both")]
    Conflicting,
    #[error("Percentage must be a number in (0, 1]")]
    PercentageOutOfRange,
    #[error("Amount must be a positive number")]
    NonPositiveAmount,
    #[error(
        "Ambiguous amount: neither 'amount_is_base' nor 'amount_is_quote' was set for an explicit amount"
    )]
    AmbiguousUnit,
    #[error("Invalid amount: 'amount_is_base' and 'amount_is_quote' cannot both be true")]
    ConflictingUnit,
}

impl Sizing {
    /// Collapse the raw payload fields into one sizing variant, enforcing
    /// exclusivity before any balance or price lookup happens.
    pub fn from_parts(
        percentage: Option<Decimal>,
        amount: Option<Decimal>,
        amount_is_base: bool,
        amount_is_quote: bool,
    ) -> Result<Self, SizingError> {
        match (percentage, amount) {
            (Some(_), Some(_)) => Err(SizingError::Conflicting),
            (None, None) => Err(SizingError::Missing),
            (Some(pct), None) => {
                if pct <= Decimal::ZERO || pct > Decimal::ONE {
                    return Err(SizingError::PercentageOutOfRange);
                }
                Ok(Sizing::Percentage(pct))
            }
            (None, Some(amt)) => {
                if amt <= Decimal::ZERO {
                    return Err(SizingError::NonPositiveAmount);
                }
                match (amount_is_base, amount_is_quote) {
                    (true, true) => Err(SizingError::ConflictingUnit),
                    (false, false) => Err(SizingError::AmbiguousUnit),
                    (true, false) => Ok(Sizing::BaseAmount(amt)),
                    (false, true) => Ok(Sizing::QuoteAmount(amt)),
                }
            }
        }
    }
}

/// A validated trade request as handed over by the webhook layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    pub symbol: String,
    pub side: Side,
    pub trade_type: TradeType,
    pub sizing: Sizing,
}

impl TradeIntent {
    pub fn new(symbol: impl Into<String>, side: Side, sizing: Sizing) -> Self {
        Self {
            symbol: symbol.into().trim().to_uppercase(),
            side,
            trade_type: TradeType::Spot,
            sizing,
        }
    }
}

/// Exchange trading filters for one symbol, post-sanitization.
///
/// All fields are guaranteed positive; see [`crate::quantize::sanitize_filters`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolFilters {
    pub step_size: Decimal,
    pub min_qty: Decimal,
    pub min_notional: Decimal,
}

/// Raw filter values as returned by the exchange, before sanitization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSymbolFilters {
    pub step_size: Option<String>,
    pub min_qty: Option<String>,
    pub min_notional: Option<String>,
}

/// JSON body returned to the webhook layer. At most one of status/error/warning
/// is set; `order` carries the raw exchange response on success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<serde_json::Value>,
}

impl ResponseBody {
    pub fn executed(status: impl Into<String>, order: serde_json::Value) -> Self {
        Self {
            status: Some(status.into()),
            order: Some(order),
            ..Self::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            warning: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Pipeline outcome plus the HTTP-style status the webhook layer should relay.
///
/// 200 covers both success and expected, non-retryable rejections so the
/// caller can always parse a JSON body without branching on transport status.
#[derive(Debug, Clone)]
pub struct TradeResponse {
    pub body: ResponseBody,
    pub status: u16,
}

impl TradeResponse {
    pub fn new(body: ResponseBody, status: u16) -> Self {
        Self { body, status }
    }
}
