use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use crate::domain::{Side, Sizing};
use crate::quantize::quantize_down;

/// Percentage-of-balance resolution always rounds to satoshi-level precision
/// before any step-size quantization happens downstream.
const PCT_PRECISION: Decimal = dec!(0.00000001);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("Balance insufficient: requested={requested}, available={available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },
    #[error("Missing price for quote-based sell")]
    MissingPrice,
}

/// Turn a sizing directive into a target trade amount.
///
/// The returned unit depends on side and sizing: SELL targets are always
/// base-asset units; BUY targets are base units for [`Sizing::BaseAmount`]
/// and quote units otherwise (the executor divides by price later).
/// Sell-side requests are checked against the free base balance here; BUY
/// sufficiency is left to the exchange's own rejection.
pub fn resolve_trade_amount(
    side: Side,
    free_balance: Decimal,
    sizing: &Sizing,
    price: Option<Decimal>,
) -> Result<Decimal, ResolveError> {
    match (side, sizing) {
        // Percentage always means "this fraction of the relevant side's own
        // asset": quote balance for BUY, base balance for SELL.
        (_, Sizing::Percentage(pct)) => {
            let resolved = quantize_down(free_balance * pct, PCT_PRECISION);
            info!(side = %side, pct = %pct, resolved = %resolved, "resolve.percentage");
            Ok(resolved)
        }

        (Side::Buy, Sizing::BaseAmount(amt)) | (Side::Buy, Sizing::QuoteAmount(amt)) => Ok(*amt),

        (Side::Sell, Sizing::BaseAmount(amt)) => {
            if *amt > free_balance {
                return Err(ResolveError::InsufficientBalance {
                    requested: *amt,
                    available: free_balance,
                });
            }
            Ok(*amt)
        }

        (Side::Sell, Sizing::QuoteAmount(amt)) => {
            let price = price
                .filter(|p| *p > Decimal::ZERO)
                .ok_or(ResolveError::MissingPrice)?;
            let base_equiv = amt / price;
            if base_equiv > free_balance {
                return Err(ResolveError::InsufficientBalance {
                    requested: base_equiv,
                    available: free_balance,
                });
            }
            info!(base = %base_equiv, quote = %amt, "resolve.sell_quote_amount");
            Ok(base_equiv)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_amounts_pass_through() {
        let sizing = Sizing::BaseAmount(dec!(5));
        assert_eq!(
            resolve_trade_amount(Side::Buy, dec!(0), &sizing, Some(dec!(10))),
            Ok(dec!(5))
        );
        let sizing = Sizing::QuoteAmount(dec!(100));
        assert_eq!(
            resolve_trade_amount(Side::Buy, dec!(0), &sizing, Some(dec!(10))),
            Ok(dec!(100))
        );
    }

    #[test]
    fn sell_base_amount_enforces_sufficiency() {
        let sizing = Sizing::BaseAmount(dec!(5));
        assert_eq!(
            resolve_trade_amount(Side::Sell, dec!(2), &sizing, Some(dec!(10))),
            Err(ResolveError::InsufficientBalance {
                requested: dec!(5),
                available: dec!(2),
            })
        );
        assert_eq!(
            resolve_trade_amount(Side::Sell, dec!(5), &sizing, Some(dec!(10))),
            Ok(dec!(5))
        );
    }

    #[test]
    fn sell_quote_amount_converts_then_checks() {
        let sizing = Sizing::QuoteAmount(dec!(50));
        // 50 / 10 = 5 base units needed, only 2 available
        assert_eq!(
            resolve_trade_amount(Side::Sell, dec!(2), &sizing, Some(dec!(10))),
            Err(ResolveError::InsufficientBalance {
                requested: dec!(5),
                available: dec!(2),
            })
        );
        assert_eq!(
            resolve_trade_amount(Side::Sell, dec!(6), &sizing, Some(dec!(10))),
            Ok(dec!(5))
        );
    }

    #[test]
    fn sell_quote_amount_requires_price() {
        let sizing = Sizing::QuoteAmount(dec!(50));
        assert_eq!(
            resolve_trade_amount(Side::Sell, dec!(10), &sizing, None),
            Err(ResolveError::MissingPrice)
        );
        assert_eq!(
            resolve_trade_amount(Side::Sell, dec!(10), &sizing, Some(dec!(0))),
            Err(ResolveError::MissingPrice)
        );
    }

    #[test]
    fn percentage_applies_to_free_balance_on_either_side() {
        let sizing = Sizing::Percentage(dec!(0.5));
        assert_eq!(
            resolve_trade_amount(Side::Buy, dec!(1000), &sizing, Some(dec!(50000))),
            Ok(dec!(500.00000000))
        );
        assert_eq!(
            resolve_trade_amount(Side::Sell, dec!(3), &sizing, Some(dec!(50000))),
            Ok(dec!(1.50000000))
        );
    }

    #[test]
    fn percentage_result_is_floored_to_1e8() {
        let sizing = Sizing::Percentage(dec!(0.333333333333));
        let resolved =
            resolve_trade_amount(Side::Sell, dec!(1), &sizing, None).expect("resolves");
        assert_eq!(resolved, dec!(0.33333333));
    }
}
