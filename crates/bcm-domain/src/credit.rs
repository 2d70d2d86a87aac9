//! Credits: pools of money committed by an account or an agency.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{account::Account, common::*, money};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CreditStatus {
    #[default]
    Pending,
    Signed,
    Canceled,
}

impl fmt::Display for CreditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CreditStatus::Pending => "Pending",
            CreditStatus::Signed => "Signed",
            CreditStatus::Canceled => "Canceled",
        };
        f.write_str(label)
    }
}

/// The single entity a credit belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CreditOwner {
    Account(Uuid),
    Agency(Uuid),
}

impl CreditOwner {
    /// Builds an owner from the optional pair a request carries; exactly one
    /// side has to be set.
    pub fn from_parts(account_id: Option<Uuid>, agency_id: Option<Uuid>) -> Option<Self> {
        match (account_id, agency_id) {
            (Some(account), None) => Some(CreditOwner::Account(account)),
            (None, Some(agency)) => Some(CreditOwner::Agency(agency)),
            _ => None,
        }
    }

    pub fn account_id(&self) -> Option<Uuid> {
        match self {
            CreditOwner::Account(id) => Some(*id),
            CreditOwner::Agency(_) => None,
        }
    }

    pub fn agency_id(&self) -> Option<Uuid> {
        match self {
            CreditOwner::Agency(id) => Some(*id),
            CreditOwner::Account(_) => None,
        }
    }
}

impl fmt::Display for CreditOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreditOwner::Account(id) => write!(f, "account {id}"),
            CreditOwner::Agency(id) => write!(f, "agency {id}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credit {
    pub id: Uuid,
    pub owner: CreditOwner,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Whole currency units.
    pub amount: i64,
    pub license_fee: Decimal,
    #[serde(default)]
    pub flat_fee_cc: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flat_fee_start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flat_fee_end_date: Option<NaiveDate>,
    pub status: CreditStatus,
    #[serde(default)]
    pub currency: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Credit {
    pub fn new(
        owner: CreditOwner,
        start_date: NaiveDate,
        end_date: NaiveDate,
        amount: i64,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            start_date,
            end_date,
            amount,
            license_fee: Decimal::ZERO,
            flat_fee_cc: 0,
            flat_fee_start_date: None,
            flat_fee_end_date: None,
            status: CreditStatus::Pending,
            currency,
            comment: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    /// Start date and license fee may only change while the credit is pending.
    pub fn is_editable(&self) -> bool {
        self.status == CreditStatus::Pending
    }

    pub fn is_signed(&self) -> bool {
        self.status == CreditStatus::Signed
    }

    pub fn is_canceled(&self) -> bool {
        self.status == CreditStatus::Canceled
    }

    pub fn date_range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    pub fn flat_fee(&self) -> Decimal {
        money::cc_to_decimal(self.flat_fee_cc)
    }

    /// Amount left for budgets once the flat fee is taken out.
    pub fn effective_amount(&self) -> Decimal {
        Decimal::from(self.amount) - self.flat_fee()
    }

    /// Returns `true` when budgets on campaigns of `account` may draw from
    /// this credit.
    pub fn covers_account(&self, account: &Account) -> bool {
        match self.owner {
            CreditOwner::Account(id) => id == account.id,
            CreditOwner::Agency(id) => account.agency_id == Some(id),
        }
    }

    pub fn flat_fee_range(&self) -> Option<DateRange> {
        match (self.flat_fee_start_date, self.flat_fee_end_date) {
            (Some(start), Some(end)) => DateRange::new(start, end).ok(),
            _ => None,
        }
    }

    /// Flat fee spread evenly over the calendar months of its window.
    pub fn get_monthly_flat_fee(&self) -> Decimal {
        match self.flat_fee_range() {
            Some(range) if range.months_touched() > 0 => {
                self.flat_fee() / Decimal::from(range.months_touched())
            }
            _ => Decimal::ZERO,
        }
    }

    /// Flat fee attributable to `[start, end]`, pro-rated by whole months and
    /// capped at the total flat fee.
    pub fn get_flat_fee_on_date_range(&self, start: NaiveDate, end: NaiveDate) -> Decimal {
        let Some(window) = self.flat_fee_range() else {
            return Decimal::ZERO;
        };
        let Ok(requested) = DateRange::new(start, end) else {
            return Decimal::ZERO;
        };
        let Some(overlap) = window.intersection(&requested) else {
            return Decimal::ZERO;
        };
        let prorated = self.get_monthly_flat_fee() * Decimal::from(overlap.months_touched());
        prorated.min(self.flat_fee())
    }
}

impl Identifiable for Credit {
    fn id(&self) -> Uuid {
        self.id
    }
}
