//! Exact conversion between decimal base-currency amounts and smallest units.

use alloy_primitives::U256;

use crate::error::ValidationError;

/// Decimal places between the base currency and its smallest unit (ether -> wei).
pub const BASE_UNIT_DECIMALS: usize = 18;

/// Scales a decimal amount such as `"1.5"` into smallest units without any
/// floating point step. Signs, exponents, and more than
/// [`BASE_UNIT_DECIMALS`] fractional digits are rejected.
pub fn to_smallest_unit(amount: &str) -> Result<U256, ValidationError> {
    let trimmed = amount.trim();
    let invalid = |reason| ValidationError::InvalidAmount {
        input: amount.to_string(),
        reason,
    };

    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("no digits"));
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid("only decimal digits and one `.` are allowed"));
    }
    if fraction.len() > BASE_UNIT_DECIMALS {
        return Err(invalid("more than 18 fractional digits"));
    }

    let mut digits = String::with_capacity(whole.len() + BASE_UNIT_DECIMALS);
    digits.push_str(whole);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat('0').take(BASE_UNIT_DECIMALS - fraction.len()));

    U256::from_str_radix(&digits, 10).map_err(|_| invalid("does not fit in 256 bits"))
}

/// Inverse of [`to_smallest_unit`]: renders smallest units as a canonical
/// decimal string with trailing fractional zeros removed.
pub fn from_smallest_unit(value: U256) -> String {
    let digits = value.to_string();
    let (whole, fraction) = if digits.len() > BASE_UNIT_DECIMALS {
        let (whole, fraction) = digits.split_at(digits.len() - BASE_UNIT_DECIMALS);
        (whole.to_string(), fraction.to_string())
    } else {
        (
            "0".to_string(),
            format!("{digits:0>width$}", width = BASE_UNIT_DECIMALS),
        )
    };

    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole
    } else {
        format!("{whole}.{fraction}")
    }
}

/// Value attached to a scheduled call: amount plus protocol fee.
/// Returns `None` on 256-bit overflow.
pub fn total_value(amount: U256, fee: U256) -> Option<U256> {
    amount.checked_add(fee)
}
