//! Integer money units used for storage and their exact decimal views.
//!
//! Amounts on credits and budgets are whole currency units. Sub-unit values
//! are kept as integers: `cc` is 1/10 000 of a unit and `nano` is 1/10⁹.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

pub const CC_PER_UNIT: i64 = 10_000;
pub const NANO_PER_UNIT: i64 = 1_000_000_000;
pub const NANO_PER_CC: i64 = NANO_PER_UNIT / CC_PER_UNIT;

const CC_SCALE: u32 = 4;
const NANO_SCALE: u32 = 9;

pub fn units_to_cc(units: i64) -> i64 {
    units.saturating_mul(CC_PER_UNIT)
}

pub fn cc_to_decimal(cc: i64) -> Decimal {
    Decimal::new(cc, CC_SCALE)
}

pub fn nano_to_decimal(nano: i64) -> Decimal {
    Decimal::new(nano, NANO_SCALE)
}

/// Sums of many nano values are carried as `i128` before conversion.
pub fn nano_sum_to_decimal(nano: i128) -> Decimal {
    Decimal::from_i128_with_scale(nano, NANO_SCALE)
}

pub fn nano_to_cc(nano: i64) -> i64 {
    decimal_to_cc(nano_to_decimal(nano))
}

/// Rounds a currency value to the nearest cc, saturating on overflow.
pub fn decimal_to_cc(value: Decimal) -> i64 {
    let scaled = (value * Decimal::from(CC_PER_UNIT))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    scaled.to_i64().unwrap_or(if scaled.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    })
}
