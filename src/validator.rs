use rust_decimal::Decimal;
use tracing::info;

use crate::domain::SymbolFilters;

/// Why a computed quantity was rejected. These are expected outcomes, not
/// faults; the executor surfaces them as 200-with-warning bodies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("Trade qty is zero or negative after rounding. Aborting.")]
    ZeroQuantity,
    #[error("Trade qty {qty} is below min_qty {min_qty}. Aborting.")]
    BelowMinQty { qty: Decimal, min_qty: Decimal },
    #[error("Trade notional {notional} is below min_notional {min_notional}. Aborting.")]
    BelowMinNotional {
        notional: Decimal,
        min_notional: Decimal,
    },
}

/// Check a quantized order quantity against the exchange filters.
/// Short-circuits on the first failing check; never panics.
pub fn validate_order_qty(
    qty: Decimal,
    price: Decimal,
    filters: &SymbolFilters,
) -> Result<(), RejectReason> {
    info!(qty = %qty, "validate.order_qty");

    if qty <= Decimal::ZERO {
        return Err(RejectReason::ZeroQuantity);
    }
    if qty < filters.min_qty {
        return Err(RejectReason::BelowMinQty {
            qty,
            min_qty: filters.min_qty,
        });
    }
    let notional = qty * price;
    if notional < filters.min_notional {
        return Err(RejectReason::BelowMinNotional {
            notional,
            min_notional: filters.min_notional,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn filters() -> SymbolFilters {
        SymbolFilters {
            step_size: dec!(0.0001),
            min_qty: dec!(0.001),
            min_notional: dec!(10),
        }
    }

    #[test]
    fn accepts_valid_quantity() {
        assert_eq!(validate_order_qty(dec!(0.01), dec!(50000), &filters()), Ok(()));
    }

    #[test]
    fn zero_quantity_wins_over_other_checks() {
        assert_eq!(
            validate_order_qty(dec!(0), dec!(50000), &filters()),
            Err(RejectReason::ZeroQuantity)
        );
    }

    #[test]
    fn rejects_below_min_qty() {
        assert_eq!(
            validate_order_qty(dec!(0.0005), dec!(50000), &filters()),
            Err(RejectReason::BelowMinQty {
                qty: dec!(0.0005),
                min_qty: dec!(0.001),
            })
        );
    }

    #[test]
    fn rejects_below_min_notional() {
        // qty clears min_qty but 0.002 * 100 = 0.2 < 10
        assert_eq!(
            validate_order_qty(dec!(0.002), dec!(100), &filters()),
            Err(RejectReason::BelowMinNotional {
                notional: dec!(0.200),
                min_notional: dec!(10),
            })
        );
    }
}
