//! Read-only roll-ups of a book for display.

use bcm_core::{BudgetService, CoreResult, CreditService, SpendFilter};
use bcm_domain::{BudgetState, CreditStatus, LedgerBook};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreditLine {
    pub id: Uuid,
    pub owner: String,
    pub status: CreditStatus,
    pub currency: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub effective_amount: Decimal,
    pub allocated: Decimal,
    pub refunded: Decimal,
    pub available: Decimal,
    pub open_for_budgets: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BudgetLine {
    pub id: Uuid,
    pub campaign: String,
    pub credit_id: Uuid,
    pub currency: String,
    pub state: BudgetState,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount: i64,
    pub spent_etfm: Decimal,
    pub available_etfm: Decimal,
    pub freed_cc: i64,
}

/// Credits and budgets of a book as they stand on `as_of`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookSummary {
    pub book: String,
    pub as_of: NaiveDate,
    pub credits: Vec<CreditLine>,
    pub budgets: Vec<BudgetLine>,
}

impl BookSummary {
    pub fn build(book: &LedgerBook, as_of: NaiveDate) -> CoreResult<Self> {
        let mut credits = Vec::with_capacity(book.credits.len());
        for credit in &book.credits {
            credits.push(CreditLine {
                id: credit.id,
                owner: book
                    .owner_name(&credit.owner)
                    .map(str::to_string)
                    .unwrap_or_else(|| credit.owner.to_string()),
                status: credit.status,
                currency: credit.currency.to_string(),
                start_date: credit.start_date,
                end_date: credit.end_date,
                effective_amount: credit.effective_amount(),
                allocated: CreditService::get_allocated_amount(book, credit.id),
                refunded: CreditService::get_refund_amount(book, credit.id),
                available: CreditService::get_available_amount(book, credit.id)?,
                open_for_budgets: CreditService::is_available(book, credit.id, as_of)?,
            });
        }
        credits.sort_by(|a, b| (a.start_date, &a.owner).cmp(&(b.start_date, &b.owner)));

        let mut budgets = Vec::with_capacity(book.budgets.len());
        for budget in &book.budgets {
            let spend = BudgetService::get_spend_data(book, budget.id, SpendFilter::up_to(as_of))?;
            budgets.push(BudgetLine {
                id: budget.id,
                campaign: book
                    .campaign(budget.campaign_id)
                    .map(|campaign| campaign.name.clone())
                    .unwrap_or_else(|| budget.campaign_id.to_string()),
                credit_id: budget.credit_id,
                currency: book
                    .credit(budget.credit_id)
                    .map(|credit| credit.currency.to_string())
                    .unwrap_or_default(),
                state: BudgetService::state(book, budget.id, as_of)?,
                start_date: budget.start_date,
                end_date: budget.end_date,
                amount: budget.amount,
                spent_etfm: spend.local_etfm_total,
                available_etfm: BudgetService::get_available_etfm_amount(book, budget.id, as_of)?,
                freed_cc: budget.freed_cc,
            });
        }
        budgets.sort_by(|a, b| (&a.campaign, a.start_date).cmp(&(&b.campaign, b.start_date)));

        Ok(Self {
            book: book.name.clone(),
            as_of,
            credits,
            budgets,
        })
    }

    pub fn total_available(&self) -> Decimal {
        self.credits
            .iter()
            .filter(|line| line.status == CreditStatus::Signed)
            .map(|line| line.available)
            .sum()
    }
}
