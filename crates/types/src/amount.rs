//! Conversions between human-readable token amounts and base units.

use crate::{Result, TypesError, U256};

/// Decimals used by the oracle's payment token.
pub const DEFAULT_DECIMALS: u32 = 18;

/// Parse a decimal string such as `"12.5"` into base units.
pub fn parse_units(value: &str, decimals: u32) -> Result<U256> {
    let value = value.trim();
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (value, ""),
    };

    let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(TypesError::InvalidAmount(value.to_string()));
    }
    if fraction.len() > decimals as usize {
        return Err(TypesError::InvalidAmount(format!(
            "{} has more than {} decimals",
            value, decimals
        )));
    }

    let scale = U256::exp10(decimals as usize);
    let whole = if whole.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(whole).map_err(|_| TypesError::Overflow)?
    };

    let mut padded = fraction.to_string();
    padded.extend(std::iter::repeat('0').take(decimals as usize - fraction.len()));
    let fraction = if padded.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(&padded).map_err(|_| TypesError::Overflow)?
    };

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(fraction))
        .ok_or(TypesError::Overflow)
}

/// Render base units as a decimal string without trailing zeros.
pub fn format_units(amount: U256, decimals: u32) -> String {
    let scale = U256::exp10(decimals as usize);
    let whole = amount / scale;
    let fraction = amount % scale;

    if fraction.is_zero() {
        return whole.to_string();
    }

    let digits = fraction.to_string();
    let mut fraction = "0".repeat(decimals as usize - digits.len());
    fraction.push_str(&digits);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_whole_units() {
        let amount = parse_units("1000", DEFAULT_DECIMALS).unwrap();
        assert_eq!(amount, U256::from(1000u64) * U256::exp10(18));
    }

    #[test]
    fn test_parse_fractional_units() {
        assert_eq!(parse_units("1.5", 2).unwrap(), U256::from(150));
        assert_eq!(parse_units(".25", 2).unwrap(), U256::from(25));
        assert_eq!(parse_units("7", 0).unwrap(), U256::from(7));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_units("", 18).is_err());
        assert!(parse_units("1.2.3", 18).is_err());
        assert!(parse_units("-4", 18).is_err());
        assert!(parse_units("0.001", 2).is_err());
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(150), 2), "1.5");
        assert_eq!(format_units(U256::from(5), 2), "0.05");
        assert_eq!(format_units(U256::exp10(18) * 3, 18), "3");
    }

    proptest! {
        #[test]
        fn format_then_parse_is_identity(raw in any::<u64>(), decimals in 0u32..19) {
            let amount = U256::from(raw);
            let text = format_units(amount, decimals);
            prop_assert_eq!(parse_units(&text, decimals).unwrap(), amount);
        }
    }
}
