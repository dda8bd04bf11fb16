use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use tracing::warn;

use crate::domain::{RawSymbolFilters, SymbolFilters};

/// Conservative fallbacks when the exchange hands back missing or
/// non-positive filter values.
pub const DEFAULT_STEP_SIZE: Decimal = dec!(0.000001);
pub const DEFAULT_MIN_QTY: Decimal = dec!(0.00001);
pub const DEFAULT_MIN_NOTIONAL: Decimal = dec!(5);

/// Floor `value` to the nearest lower multiple of `step`, expressed at
/// `step`'s decimal precision.
///
/// A zero or negative step returns the value unchanged: over-rejecting
/// trades is worse than mild precision loss, and the min-qty/min-notional
/// checks downstream still act as a backstop.
pub fn quantize_down(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        warn!(%value, %step, "quantize.invalid_step, skipping quantization");
        return value;
    }
    let mut quantized = (value / step).floor() * step;
    quantized.rescale(step.scale());
    quantized
}

fn sanitize_field(name: &str, raw: Option<&str>, default: Decimal) -> Decimal {
    match raw.and_then(|s| Decimal::from_str(s.trim()).ok()) {
        Some(v) if v > Decimal::ZERO => v,
        _ => {
            warn!(field = name, raw = raw.unwrap_or("<missing>"), %default, "filters.sanitize_default");
            default
        }
    }
}

/// Parse raw exchange filters into validated, always-positive values so the
/// validator never divides by zero or accepts a zero step.
pub fn sanitize_filters(raw: &RawSymbolFilters) -> SymbolFilters {
    SymbolFilters {
        step_size: sanitize_field("step_size", raw.step_size.as_deref(), DEFAULT_STEP_SIZE),
        min_qty: sanitize_field("min_qty", raw.min_qty.as_deref(), DEFAULT_MIN_QTY),
        min_notional: sanitize_field(
            "min_notional",
            raw.min_notional.as_deref(),
            DEFAULT_MIN_NOTIONAL,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_to_step_multiple() {
        assert_eq!(quantize_down(dec!(1.23456789), dec!(0.0001)), dec!(1.2345));
        assert_eq!(quantize_down(dec!(0.01), dec!(0.0001)), dec!(0.0100));
        assert_eq!(quantize_down(dec!(0.0000001), dec!(1)), dec!(0));
    }

    #[test]
    fn idempotent() {
        for (x, s) in [
            (dec!(1.23456789), dec!(0.0001)),
            (dec!(999.999), dec!(0.5)),
            (dec!(0.00000001), dec!(0.00000001)),
        ] {
            let once = quantize_down(x, s);
            assert_eq!(quantize_down(once, s), once);
        }
    }

    #[test]
    fn never_rounds_up_and_lands_on_multiple() {
        for (x, s) in [
            (dec!(7.777), dec!(0.25)),
            (dec!(0.019), dec!(0.01)),
            (dec!(123.456), dec!(0.001)),
        ] {
            let q = quantize_down(x, s);
            assert!(q <= x);
            assert_eq!(q % s, Decimal::ZERO);
        }
    }

    #[test]
    fn invalid_step_is_fail_open() {
        assert_eq!(quantize_down(dec!(1.234), dec!(0)), dec!(1.234));
        assert_eq!(quantize_down(dec!(1.234), dec!(-0.1)), dec!(1.234));
    }

    #[test]
    fn sanitize_keeps_valid_values() {
        let raw = RawSymbolFilters {
            step_size: Some("0.0001".into()),
            min_qty: Some("0.001".into()),
            min_notional: Some("10".into()),
        };
        let f = sanitize_filters(&raw);
        assert_eq!(f.step_size, dec!(0.0001));
        assert_eq!(f.min_qty, dec!(0.001));
        assert_eq!(f.min_notional, dec!(10));
    }

    #[test]
    fn sanitize_substitutes_defaults() {
        let raw = RawSymbolFilters {
            step_size: Some("0".into()),
            min_qty: Some("not-a-number".into()),
            min_notional: None,
        };
        let f = sanitize_filters(&raw);
        assert_eq!(f.step_size, DEFAULT_STEP_SIZE);
        assert_eq!(f.min_qty, DEFAULT_MIN_QTY);
        assert_eq!(f.min_notional, DEFAULT_MIN_NOTIONAL);
    }
}
