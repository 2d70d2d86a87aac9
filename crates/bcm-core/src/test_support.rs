//! Shared fixtures and collaborator doubles for the service tests.

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use bcm_domain::{
    Account, Agency, Budget, Campaign, Credit, CreditOwner, CreditStatus, CurrencyCode,
    DailyStatement, LedgerBook,
};

use crate::{
    collaborators::{
        CampaignStopValidator, CreationEvent, LedgerContext, MemoryAuditSink, MinAmountError,
        NotificationSink,
    },
    error::{CoreError, CoreResult},
    time::FixedClock,
};

pub const ACTOR: &str = "ops@example.com";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// One agency, one bcm-v2 USD account under it and one campaign.
pub struct Fixture {
    pub book: LedgerBook,
    pub agency_id: Uuid,
    pub account_id: Uuid,
    pub campaign_id: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        let mut book = LedgerBook::new("Fixture");
        let agency_id = book.add_agency(Agency::new("Mediahaus"));
        let account_id = book.add_account(
            Account::new("Acme Retail", CurrencyCode::usd())
                .with_agency(agency_id)
                .with_bcm_v2(true),
        );
        let campaign_id = book.add_campaign(Campaign::new("Spring Launch", account_id));
        Self {
            book,
            agency_id,
            account_id,
            campaign_id,
        }
    }

    /// Context pinned to 2024-01-01.
    pub fn context(&self) -> LedgerContext {
        self.context_on(date(2024, 1, 1))
    }

    pub fn context_on(&self, today: NaiveDate) -> LedgerContext {
        LedgerContext::default().with_clock(FixedClock(today))
    }

    pub fn recording_context(
        &self,
    ) -> (LedgerContext, Arc<MemoryAuditSink>, Arc<RecordingNotifications>) {
        let audit = Arc::new(MemoryAuditSink::new());
        let notes = Arc::new(RecordingNotifications::default());
        let ctx = self
            .context()
            .with_audit(audit.clone())
            .with_notifications(notes.clone());
        (ctx, audit, notes)
    }

    pub fn signed_credit(&mut self, amount: i64) -> Uuid {
        self.signed_credit_with(amount, |_| {})
    }

    pub fn signed_credit_with(&mut self, amount: i64, adjust: impl FnOnce(&mut Credit)) -> Uuid {
        let mut credit = self.year_credit(CreditOwner::Account(self.account_id), amount);
        credit.status = CreditStatus::Signed;
        adjust(&mut credit);
        self.book.add_credit(credit)
    }

    pub fn signed_agency_credit(&mut self, amount: i64) -> Uuid {
        let mut credit = self.year_credit(CreditOwner::Agency(self.agency_id), amount);
        credit.status = CreditStatus::Signed;
        self.book.add_credit(credit)
    }

    pub fn pending_credit(&mut self, amount: i64) -> Uuid {
        let credit = self.year_credit(CreditOwner::Account(self.account_id), amount);
        self.book.add_credit(credit)
    }

    /// Inserts a budget on the fixture campaign without validation.
    pub fn insert_budget(
        &mut self,
        credit_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
        amount: i64,
    ) -> Uuid {
        self.book
            .add_budget(Budget::new(self.campaign_id, credit_id, start, end, amount))
    }

    /// Records `units` of media spend in both billing and local currency.
    pub fn record_spend(&mut self, budget_id: Uuid, day: NaiveDate, units: i64) {
        let nano = units * 1_000_000_000;
        self.record_statement(DailyStatement::new(budget_id, day).with_spend(nano, 0, 0, 0));
    }

    pub fn record_statement(&mut self, statement: DailyStatement) {
        self.book.record_statement(statement);
    }

    pub fn set_bcm_v2(&mut self, enabled: bool) {
        if let Some(account) = self.book.accounts.iter_mut().find(|a| a.id == self.account_id) {
            account.uses_bcm_v2 = enabled;
        }
    }

    pub fn set_real_time_campaign_stop(&mut self, enabled: bool) {
        if let Some(campaign) = self
            .book
            .campaigns
            .iter_mut()
            .find(|c| c.id == self.campaign_id)
        {
            campaign.real_time_campaign_stop = enabled;
        }
    }

    fn year_credit(&self, owner: CreditOwner, amount: i64) -> Credit {
        Credit::new(
            owner,
            date(2024, 1, 1),
            date(2024, 12, 31),
            amount,
            CurrencyCode::usd(),
        )
    }
}

#[derive(Default)]
pub struct RecordingNotifications {
    events: Mutex<Vec<CreationEvent>>,
}

impl RecordingNotifications {
    pub fn events(&self) -> Vec<CreationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingNotifications {
    fn notify(&self, event: &CreationEvent) -> CoreResult<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub struct FailingNotifications;

impl NotificationSink for FailingNotifications {
    fn notify(&self, _: &CreationEvent) -> CoreResult<()> {
        Err(CoreError::Collaborator("mail relay unreachable".into()))
    }
}

/// Campaign stop that rejects anything below a fixed amount.
pub struct MinimumAmount(pub Decimal);

impl CampaignStopValidator for MinimumAmount {
    fn validate_minimum_budget_amount(
        &self,
        _: &Budget,
        proposed_amount: i64,
    ) -> Result<(), MinAmountError> {
        if Decimal::from(proposed_amount) < self.0 {
            Err(MinAmountError { min_amount: self.0 })
        } else {
            Ok(())
        }
    }
}
