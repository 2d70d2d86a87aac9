//! Fee and margin arithmetic on exact decimals.
//!
//! Gross-up direction: `x / ((1 − fee)·(1 − margin))`. Net-down direction:
//! `x · (1 − fee)·(1 − margin)`. A missing fee or margin counts as zero.
//! Fees and margins are fractions in `[0, 1)`; the gross-up divides by zero
//! when either equals one, which validation rules out before values get here.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

const CPC_DECIMAL_PLACES: u32 = 3;
const DAILY_BUDGET_DECIMAL_PLACES: u32 = 0;

/// Fee and margin in force for a campaign on a given day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeContext {
    pub license_fee: Option<Decimal>,
    pub margin: Option<Decimal>,
}

impl FeeContext {
    pub fn new(license_fee: Decimal, margin: Decimal) -> Self {
        Self {
            license_fee: Some(license_fee),
            margin: Some(margin),
        }
    }
}

fn retained(fraction: Option<Decimal>) -> Decimal {
    Decimal::ONE - fraction.unwrap_or(Decimal::ZERO)
}

pub fn apply_fee(value: Decimal, fee: Option<Decimal>) -> Decimal {
    value / retained(fee)
}

pub fn apply_margin(value: Decimal, margin: Option<Decimal>) -> Decimal {
    value / retained(margin)
}

pub fn apply_fee_and_margin(value: Decimal, fee: Option<Decimal>, margin: Option<Decimal>) -> Decimal {
    value / (retained(fee) * retained(margin))
}

pub fn calculate_fee(value: Decimal, fee: Option<Decimal>) -> Decimal {
    apply_fee(value, fee) - value
}

pub fn calculate_margin(value: Decimal, margin: Option<Decimal>) -> Decimal {
    apply_margin(value, margin) - value
}

pub fn calculate_fee_and_margin(
    value: Decimal,
    fee: Option<Decimal>,
    margin: Option<Decimal>,
) -> Decimal {
    apply_fee_and_margin(value, fee, margin) - value
}

pub fn subtract_fee(value: Decimal, fee: Option<Decimal>) -> Decimal {
    value * retained(fee)
}

pub fn subtract_margin(value: Decimal, margin: Option<Decimal>) -> Decimal {
    value * retained(margin)
}

pub fn subtract_fee_and_margin(
    value: Decimal,
    fee: Option<Decimal>,
    margin: Option<Decimal>,
) -> Decimal {
    value * retained(fee) * retained(margin)
}

fn gross_up(value: Decimal, context: Option<&FeeContext>) -> Option<Decimal> {
    context.map(|ctx| apply_fee_and_margin(value, ctx.license_fee, ctx.margin))
}

/// Minimums round up so the effective minimum never undercuts the raw rule.
fn bound_min(value: Decimal, context: Option<&FeeContext>, places: u32) -> Decimal {
    match gross_up(value, context) {
        Some(grossed) => grossed.round_dp_with_strategy(places, RoundingStrategy::ToPositiveInfinity),
        None => value,
    }
}

/// Maximums round down so the effective maximum never exceeds the raw rule.
fn bound_max(value: Decimal, context: Option<&FeeContext>, places: u32) -> Decimal {
    match gross_up(value, context) {
        Some(grossed) => grossed.round_dp_with_strategy(places, RoundingStrategy::ToNegativeInfinity),
        None => value,
    }
}

pub fn calculate_min_cpc(value: Decimal, context: Option<&FeeContext>) -> Decimal {
    bound_min(value, context, CPC_DECIMAL_PLACES)
}

pub fn calculate_max_cpc(value: Decimal, context: Option<&FeeContext>) -> Decimal {
    bound_max(value, context, CPC_DECIMAL_PLACES)
}

pub fn calculate_min_daily_budget(value: Decimal, context: Option<&FeeContext>) -> Decimal {
    bound_min(value, context, DAILY_BUDGET_DECIMAL_PLACES)
}

pub fn calculate_max_daily_budget(value: Decimal, context: Option<&FeeContext>) -> Decimal {
    bound_max(value, context, DAILY_BUDGET_DECIMAL_PLACES)
}
