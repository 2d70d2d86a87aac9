//! Month-aligned corrections that give money back to a credit.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Refund {
    pub id: Uuid,
    pub account_id: Uuid,
    pub credit_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Whole currency units of the credit's currency.
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Refund {
    /// The end date always follows the start date's month; the start date is
    /// kept as given so validation can reject one that is not a 1st.
    pub fn new(account_id: Uuid, credit_id: Uuid, start_date: NaiveDate, amount: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            credit_id,
            start_date,
            end_date: last_day_of_month(start_date),
            amount,
            comment: None,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    pub fn set_start_date(&mut self, start_date: NaiveDate) {
        self.start_date = start_date;
        self.end_date = last_day_of_month(start_date);
    }
}

impl Identifiable for Refund {
    fn id(&self) -> Uuid {
        self.id
    }
}
