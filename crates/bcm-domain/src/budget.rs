//! Budgets: time-boxed slices of a credit assigned to one campaign.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{common::*, money};

/// Computed from dates and spend, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BudgetState {
    Pending,
    Active,
    Inactive,
    Depleted,
}

impl BudgetState {
    /// States in which dates and amount may still be edited.
    pub fn is_editable(self) -> bool {
        matches!(self, BudgetState::Pending | BudgetState::Active)
    }
}

impl fmt::Display for BudgetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BudgetState::Pending => "Pending",
            BudgetState::Active => "Active",
            BudgetState::Inactive => "Inactive",
            BudgetState::Depleted => "Depleted",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub credit_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Whole currency units of the parent credit's currency.
    pub amount: i64,
    #[serde(default)]
    pub margin: Decimal,
    /// Part of the allocation handed back to the credit after the budget
    /// stopped spending. Never decreases.
    #[serde(default)]
    pub freed_cc: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Budget {
    pub fn new(
        campaign_id: Uuid,
        credit_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        amount: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            credit_id,
            start_date,
            end_date,
            amount,
            margin: Decimal::ZERO,
            freed_cc: 0,
            comment: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    pub fn date_range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    pub fn amount_cc(&self) -> i64 {
        money::units_to_cc(self.amount)
    }

    pub fn allocated_amount_cc(&self) -> i64 {
        self.amount_cc() - self.freed_cc
    }

    /// Part of the parent credit this budget still holds.
    pub fn allocated_amount(&self) -> Decimal {
        money::cc_to_decimal(self.allocated_amount_cc())
    }

    /// Straight-line pacing target on `date`; used for pacing, not accounting.
    pub fn get_ideal_budget_spend(&self, date: NaiveDate) -> Decimal {
        if date < self.start_date {
            return Decimal::ZERO;
        }
        if date >= self.end_date {
            return Decimal::from(self.amount);
        }
        let elapsed = (date - self.start_date).num_days() + 1;
        let total = self.date_range().days();
        Decimal::from(self.amount) * Decimal::from(elapsed) / Decimal::from(total)
    }

    /// Resolves the state for `date` given what is still available on it.
    /// Depletion wins over the date-based states.
    pub fn state_on(&self, date: NaiveDate, available: Decimal) -> BudgetState {
        if available <= Decimal::ZERO {
            BudgetState::Depleted
        } else if self.end_date < date {
            BudgetState::Inactive
        } else if self.start_date <= date {
            BudgetState::Active
        } else {
            BudgetState::Pending
        }
    }
}

impl Identifiable for Budget {
    fn id(&self) -> Uuid {
        self.id
    }
}
