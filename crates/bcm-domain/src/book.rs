use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    account::{Account, Agency, Campaign},
    budget::Budget,
    credit::{Credit, CreditOwner},
    refund::Refund,
    statement::DailyStatement,
};

pub const CURRENT_SCHEMA_VERSION: u8 = 1;

/// Snapshot of every entity the ledger reasons about. Services validate
/// against it and commit into it; storage backends persist it whole.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerBook {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub agencies: Vec<Agency>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub credits: Vec<Credit>,
    #[serde(default)]
    pub budgets: Vec<Budget>,
    #[serde(default)]
    pub statements: Vec<DailyStatement>,
    #[serde(default)]
    pub refunds: Vec<Refund>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "LedgerBook::schema_version_default")]
    pub schema_version: u8,
}

impl LedgerBook {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            agencies: Vec::new(),
            accounts: Vec::new(),
            campaigns: Vec::new(),
            credits: Vec::new(),
            budgets: Vec::new(),
            statements: Vec::new(),
            refunds: Vec::new(),
            created_at: now,
            updated_at: now,
            schema_version: CURRENT_SCHEMA_VERSION,
        }
    }

    pub fn add_agency(&mut self, agency: Agency) -> Uuid {
        let id = agency.id;
        self.agencies.push(agency);
        self.touch();
        id
    }

    pub fn add_account(&mut self, account: Account) -> Uuid {
        let id = account.id;
        self.accounts.push(account);
        self.touch();
        id
    }

    pub fn add_campaign(&mut self, campaign: Campaign) -> Uuid {
        let id = campaign.id;
        self.campaigns.push(campaign);
        self.touch();
        id
    }

    pub fn add_credit(&mut self, credit: Credit) -> Uuid {
        let id = credit.id;
        self.credits.push(credit);
        self.touch();
        id
    }

    pub fn add_budget(&mut self, budget: Budget) -> Uuid {
        let id = budget.id;
        self.budgets.push(budget);
        self.touch();
        id
    }

    pub fn add_refund(&mut self, refund: Refund) -> Uuid {
        let id = refund.id;
        self.refunds.push(refund);
        self.touch();
        id
    }

    /// Stores a statement, replacing any existing row for the same budget and date.
    pub fn record_statement(&mut self, statement: DailyStatement) {
        match self
            .statements
            .iter_mut()
            .find(|row| row.budget_id == statement.budget_id && row.date == statement.date)
        {
            Some(existing) => *existing = statement,
            None => self.statements.push(statement),
        }
        self.touch();
    }

    pub fn agency(&self, id: Uuid) -> Option<&Agency> {
        self.agencies.iter().find(|agency| agency.id == id)
    }

    pub fn account(&self, id: Uuid) -> Option<&Account> {
        self.accounts.iter().find(|account| account.id == id)
    }

    pub fn campaign(&self, id: Uuid) -> Option<&Campaign> {
        self.campaigns.iter().find(|campaign| campaign.id == id)
    }

    pub fn credit(&self, id: Uuid) -> Option<&Credit> {
        self.credits.iter().find(|credit| credit.id == id)
    }

    pub fn credit_mut(&mut self, id: Uuid) -> Option<&mut Credit> {
        self.credits.iter_mut().find(|credit| credit.id == id)
    }

    pub fn budget(&self, id: Uuid) -> Option<&Budget> {
        self.budgets.iter().find(|budget| budget.id == id)
    }

    pub fn budget_mut(&mut self, id: Uuid) -> Option<&mut Budget> {
        self.budgets.iter_mut().find(|budget| budget.id == id)
    }

    pub fn refund(&self, id: Uuid) -> Option<&Refund> {
        self.refunds.iter().find(|refund| refund.id == id)
    }

    pub fn refund_mut(&mut self, id: Uuid) -> Option<&mut Refund> {
        self.refunds.iter_mut().find(|refund| refund.id == id)
    }

    pub fn budgets_of_credit(&self, credit_id: Uuid) -> impl Iterator<Item = &Budget> {
        self.budgets
            .iter()
            .filter(move |budget| budget.credit_id == credit_id)
    }

    pub fn budgets_of_campaign(&self, campaign_id: Uuid) -> impl Iterator<Item = &Budget> {
        self.budgets
            .iter()
            .filter(move |budget| budget.campaign_id == campaign_id)
    }

    pub fn refunds_of_credit(&self, credit_id: Uuid) -> impl Iterator<Item = &Refund> {
        self.refunds
            .iter()
            .filter(move |refund| refund.credit_id == credit_id)
    }

    /// Statements of a budget ordered by date, oldest first.
    pub fn statements_of_budget(&self, budget_id: Uuid) -> Vec<&DailyStatement> {
        let mut rows: Vec<&DailyStatement> = self
            .statements
            .iter()
            .filter(|row| row.budget_id == budget_id)
            .collect();
        rows.sort_by_key(|row| row.date);
        rows
    }

    /// Account owning the campaign.
    pub fn campaign_account(&self, campaign_id: Uuid) -> Option<&Account> {
        self.campaign(campaign_id)
            .and_then(|campaign| self.account(campaign.account_id))
    }

    pub fn owner_name(&self, owner: &CreditOwner) -> Option<&str> {
        match owner {
            CreditOwner::Account(id) => self.account(*id).map(|account| account.name.as_str()),
            CreditOwner::Agency(id) => self.agency(*id).map(|agency| agency.name.as_str()),
        }
    }

    pub fn replace_credit(&mut self, credit: Credit) -> bool {
        match self.credit_mut(credit.id) {
            Some(slot) => {
                *slot = credit;
                self.touch();
                true
            }
            None => false,
        }
    }

    pub fn replace_budget(&mut self, budget: Budget) -> bool {
        match self.budget_mut(budget.id) {
            Some(slot) => {
                *slot = budget;
                self.touch();
                true
            }
            None => false,
        }
    }

    pub fn replace_refund(&mut self, refund: Refund) -> bool {
        match self.refund_mut(refund.id) {
            Some(slot) => {
                *slot = refund;
                self.touch();
                true
            }
            None => false,
        }
    }

    /// Removes a credit along with its refunds.
    pub fn remove_credit(&mut self, id: Uuid) -> Option<Credit> {
        let index = self.credits.iter().position(|credit| credit.id == id)?;
        self.refunds.retain(|refund| refund.credit_id != id);
        self.touch();
        Some(self.credits.remove(index))
    }

    /// Removes a budget along with its statements.
    pub fn remove_budget(&mut self, id: Uuid) -> Option<Budget> {
        let index = self.budgets.iter().position(|budget| budget.id == id)?;
        self.statements.retain(|row| row.budget_id != id);
        self.touch();
        Some(self.budgets.remove(index))
    }

    pub fn remove_refund(&mut self, id: Uuid) -> Option<Refund> {
        let index = self.refunds.iter().position(|refund| refund.id == id)?;
        self.touch();
        Some(self.refunds.remove(index))
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn schema_version_default() -> u8 {
        CURRENT_SCHEMA_VERSION
    }
}
