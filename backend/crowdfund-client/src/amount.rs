//! Conversions between user-entered XLM strings and stroops.
//!
//! Everything that crosses the wallet or ledger boundary is an integer number
//! of stroops. Strings produced by [`to_decimal_display`] are for people only
//! and must never be parsed back into a transaction amount.

use std::str::FromStr;

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};

/// Decimal places of the native asset.
pub const DECIMALS: u32 = 7;

/// Stroops in one XLM.
pub const STROOPS_PER_XLM: i128 = 10_000_000;

/// Parse a decimal XLM amount into stroops, truncating anything past the
/// seventh decimal place.
///
/// Returns `0` for input that is empty, not a number, zero or negative. Zero
/// is the "no valid amount" value; callers reject it before any network call.
pub fn to_minor_units(input: &str) -> i128 {
    let trimmed = input.trim();
    let parsed = Decimal::from_str(trimmed).or_else(|_| Decimal::from_scientific(trimmed));
    let Ok(value) = parsed else {
        return 0;
    };
    if value <= Decimal::ZERO {
        return 0;
    }

    value
        .checked_mul(Decimal::new(STROOPS_PER_XLM as i64, 0))
        .map(|scaled| scaled.trunc())
        .and_then(|whole| whole.to_i128())
        .unwrap_or(0)
}

/// Render stroops as XLM with exactly two decimals, rounding half away from
/// zero. Lossy.
pub fn to_decimal_display(stroops: i128) -> String {
    match Decimal::try_from_i128_with_scale(stroops, DECIMALS) {
        Ok(value) => {
            let mut rounded =
                value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            rounded.rescale(2);
            rounded.to_string()
        }
        // Beyond 96 bits: fall back to truncating integer arithmetic.
        Err(_) => {
            let sign = if stroops < 0 { "-" } else { "" };
            let abs = stroops.unsigned_abs();
            let unit = STROOPS_PER_XLM as u128;
            format!("{sign}{}.{:02}", abs / unit, (abs % unit) / 100_000)
        }
    }
}

/// Render stroops as XLM at full precision with trailing zeros removed.
/// `to_minor_units(&to_decimal_string(v)) == v` for every positive `v`.
pub fn to_decimal_string(stroops: i128) -> String {
    match Decimal::try_from_i128_with_scale(stroops, DECIMALS) {
        Ok(value) => value.normalize().to_string(),
        Err(_) => {
            let sign = if stroops < 0 { "-" } else { "" };
            let abs = stroops.unsigned_abs();
            let unit = STROOPS_PER_XLM as u128;
            let fraction = format!("{:07}", abs % unit);
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{sign}{}", abs / unit)
            } else {
                format!("{sign}{}.{fraction}", abs / unit)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn whole_amount_scales_to_stroops() {
        assert_eq!(to_minor_units("10"), 100_000_000);
        assert_eq!(to_decimal_display(100_000_000), "10.00");
    }

    #[test]
    fn fractional_amounts_are_exact() {
        assert_eq!(to_minor_units("0.1"), 1_000_000);
        assert_eq!(to_minor_units("4.35"), 43_500_000);
        assert_eq!(to_minor_units("0.0000001"), 1);
        assert_eq!(to_minor_units(" 2.5 "), 25_000_000);
    }

    #[test]
    fn excess_precision_is_truncated_not_rounded() {
        assert_eq!(to_minor_units("1.123456789"), 11_234_567);
        assert_eq!(to_minor_units("0.00000009"), 0);
    }

    #[test]
    fn scientific_notation_is_accepted() {
        assert_eq!(to_minor_units("1e2"), 1_000_000_000);
    }

    #[test]
    fn invalid_input_maps_to_zero() {
        for input in ["", "   ", "abc", "NaN", "Infinity", "0", "0.0", "-1", "-0.5", "1.2.3", "10 XLM"] {
            assert_eq!(to_minor_units(input), 0, "input {input:?}");
        }
    }

    #[test]
    fn display_rounds_to_two_places() {
        assert_eq!(to_decimal_display(0), "0.00");
        assert_eq!(to_decimal_display(1), "0.00");
        assert_eq!(to_decimal_display(50_000), "0.01");
        assert_eq!(to_decimal_display(12_345_678), "1.23");
        assert_eq!(to_decimal_display(250_000_000), "25.00");
    }

    #[test]
    fn display_is_lossy() {
        let stroops = 12_345_678;
        assert_ne!(to_minor_units(&to_decimal_display(stroops)), stroops);
    }

    #[test]
    fn full_precision_string_trims_zeros() {
        assert_eq!(to_decimal_string(100_000_000), "10");
        assert_eq!(to_decimal_string(12_345_678), "1.2345678");
        assert_eq!(to_decimal_string(1), "0.0000001");
    }

    proptest! {
        #[test]
        fn full_precision_round_trip(stroops in 1i128..=(i64::MAX as i128)) {
            prop_assert_eq!(to_minor_units(&to_decimal_string(stroops)), stroops);
        }

        #[test]
        fn arbitrary_text_never_panics(input in ".*") {
            prop_assert!(to_minor_units(&input) >= 0);
        }
    }
}
