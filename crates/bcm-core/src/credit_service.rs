//! Credits: pools of money granted to an account or an agency.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use bcm_domain::{Credit, CreditOwner, CreditStatus, CurrencyCode, LedgerBook};

use crate::{
    audit::{ActionKind, ChangeSet, EntityKind},
    collaborators::{CreationEvent, LedgerContext},
    error::{CoreError, CoreResult, ValidationError, ValidationFailures},
    spend_service::{SpendFilter, SpendService, SpendTotals},
};

/// Request to open a credit. Exactly one of `account_id` / `agency_id` must be set.
#[derive(Debug, Clone)]
pub struct NewCredit {
    pub account_id: Option<Uuid>,
    pub agency_id: Option<Uuid>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount: i64,
    pub license_fee: Decimal,
    pub flat_fee_cc: i64,
    pub flat_fee_start_date: Option<NaiveDate>,
    pub flat_fee_end_date: Option<NaiveDate>,
    pub currency: CurrencyCode,
    pub comment: Option<String>,
}

impl NewCredit {
    pub fn for_account(
        account_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        amount: i64,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            account_id: Some(account_id),
            agency_id: None,
            start_date,
            end_date,
            amount,
            license_fee: Decimal::ZERO,
            flat_fee_cc: 0,
            flat_fee_start_date: None,
            flat_fee_end_date: None,
            currency,
            comment: None,
        }
    }

    pub fn for_agency(
        agency_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        amount: i64,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            account_id: None,
            agency_id: Some(agency_id),
            ..Self::for_account(Uuid::nil(), start_date, end_date, amount, currency)
        }
    }

    pub fn with_license_fee(mut self, license_fee: Decimal) -> Self {
        self.license_fee = license_fee;
        self
    }

    pub fn with_flat_fee(mut self, flat_fee_cc: i64, start: NaiveDate, end: NaiveDate) -> Self {
        self.flat_fee_cc = flat_fee_cc;
        self.flat_fee_start_date = Some(start);
        self.flat_fee_end_date = Some(end);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Partial update; only `Some` fields change.
#[derive(Debug, Clone, Default)]
pub struct CreditPatch {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub amount: Option<i64>,
    pub license_fee: Option<Decimal>,
    pub flat_fee_cc: Option<i64>,
    pub flat_fee_start_date: Option<Option<NaiveDate>>,
    pub flat_fee_end_date: Option<Option<NaiveDate>>,
    pub status: Option<CreditStatus>,
    pub comment: Option<Option<String>>,
}

impl CreditPatch {
    pub fn sign() -> Self {
        Self {
            status: Some(CreditStatus::Signed),
            ..Self::default()
        }
    }

    fn apply(&self, credit: &mut Credit) {
        if let Some(start_date) = self.start_date {
            credit.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            credit.end_date = end_date;
        }
        if let Some(amount) = self.amount {
            credit.amount = amount;
        }
        if let Some(license_fee) = self.license_fee {
            credit.license_fee = license_fee;
        }
        if let Some(flat_fee_cc) = self.flat_fee_cc {
            credit.flat_fee_cc = flat_fee_cc;
        }
        if let Some(start) = self.flat_fee_start_date {
            credit.flat_fee_start_date = start;
        }
        if let Some(end) = self.flat_fee_end_date {
            credit.flat_fee_end_date = end;
        }
        if let Some(status) = self.status {
            credit.status = status;
        }
        if let Some(comment) = &self.comment {
            credit.comment = comment.clone();
        }
    }
}

pub struct CreditService;

impl CreditService {
    pub fn create(
        book: &mut LedgerBook,
        ctx: &LedgerContext,
        request: NewCredit,
        actor: &str,
    ) -> CoreResult<Uuid> {
        let owner = CreditOwner::from_parts(request.account_id, request.agency_id);
        match owner {
            Some(CreditOwner::Account(id)) if book.account(id).is_none() => {
                return Err(CoreError::AccountNotFound(id));
            }
            Some(CreditOwner::Agency(id)) if book.agency(id).is_none() => {
                return Err(CoreError::AgencyNotFound(id));
            }
            _ => {}
        }

        // Checks below never look at the owner, so a nil placeholder keeps them running.
        let mut credit = Credit::new(
            owner.unwrap_or(CreditOwner::Account(Uuid::nil())),
            request.start_date,
            request.end_date,
            request.amount,
            request.currency,
        );
        credit.license_fee = request.license_fee;
        credit.flat_fee_cc = request.flat_fee_cc;
        credit.flat_fee_start_date = request.flat_fee_start_date;
        credit.flat_fee_end_date = request.flat_fee_end_date;
        credit.comment = request.comment;
        credit.created_by = Some(actor.to_string());
        credit.created_at = ctx.clock.now();

        let mut failures = Self::clean(book, None, &credit);
        if owner.is_none() {
            failures.insert(0, ValidationError::CreditOwnerInvalid);
        }
        ValidationFailures::check(failures)?;

        let record = credit_changes(None, &credit).into_record(
            EntityKind::Credit,
            credit.id,
            ActionKind::Created,
            actor,
            ctx.clock.now(),
        );
        ctx.audit.record(record)?;

        let event = CreationEvent {
            entity: EntityKind::Credit,
            id: credit.id,
            owner_name: book.owner_name(&credit.owner).unwrap_or_default().to_string(),
            amount: credit.amount,
            currency_symbol: credit.currency.symbol(),
            end_date: credit.end_date,
        };
        let id = book.add_credit(credit);
        tracing::info!(credit = %id, "credit created");
        ctx.announce(event);
        Ok(id)
    }

    pub fn update(
        book: &mut LedgerBook,
        ctx: &LedgerContext,
        credit_id: Uuid,
        patch: CreditPatch,
        actor: &str,
    ) -> CoreResult<()> {
        let previous = book
            .credit(credit_id)
            .cloned()
            .ok_or(CoreError::CreditNotFound(credit_id))?;
        let mut candidate = previous.clone();
        patch.apply(&mut candidate);

        ValidationFailures::check(Self::clean(book, Some(&previous), &candidate))?;
        Self::commit(book, ctx, &previous, candidate, actor)
    }

    /// Marks the credit canceled regardless of its current status.
    pub fn cancel(
        book: &mut LedgerBook,
        ctx: &LedgerContext,
        credit_id: Uuid,
        actor: &str,
    ) -> CoreResult<()> {
        let previous = book
            .credit(credit_id)
            .cloned()
            .ok_or(CoreError::CreditNotFound(credit_id))?;
        let mut candidate = previous.clone();
        candidate.status = CreditStatus::Canceled;
        Self::commit(book, ctx, &previous, candidate, actor)
    }

    pub fn delete(
        book: &mut LedgerBook,
        ctx: &LedgerContext,
        credit_id: Uuid,
        actor: &str,
    ) -> CoreResult<()> {
        let credit = book
            .credit(credit_id)
            .ok_or(CoreError::CreditNotFound(credit_id))?;
        if credit.status != CreditStatus::Pending {
            return Err(CoreError::InvalidOperation(format!(
                "credit {credit_id} is {} and cannot be deleted",
                credit.status
            )));
        }
        let record = ChangeSet::new().into_record(
            EntityKind::Credit,
            credit_id,
            ActionKind::Deleted,
            actor,
            ctx.clock.now(),
        );
        ctx.audit.record(record)?;
        book.remove_credit(credit_id);
        book.touch();
        tracing::info!(credit = %credit_id, "credit deleted");
        Ok(())
    }

    /// Sum of what the credit's budgets still hold.
    pub fn get_allocated_amount(book: &LedgerBook, credit_id: Uuid) -> Decimal {
        book.budgets_of_credit(credit_id)
            .map(|budget| budget.allocated_amount())
            .sum()
    }

    pub fn get_refund_amount(book: &LedgerBook, credit_id: Uuid) -> Decimal {
        book.refunds_of_credit(credit_id)
            .map(|refund| Decimal::from(refund.amount))
            .sum()
    }

    /// Effective amount plus refunds, minus what budgets hold.
    pub fn get_available_amount(book: &LedgerBook, credit_id: Uuid) -> CoreResult<Decimal> {
        let credit = book
            .credit(credit_id)
            .ok_or(CoreError::CreditNotFound(credit_id))?;
        Ok(Self::available_for(book, credit))
    }

    /// Signed, not yet ended on `date` and with money left to allocate.
    pub fn is_available(book: &LedgerBook, credit_id: Uuid, date: NaiveDate) -> CoreResult<bool> {
        let credit = book
            .credit(credit_id)
            .ok_or(CoreError::CreditNotFound(credit_id))?;
        Ok(Self::credit_is_available(book, credit, date))
    }

    /// Credits budgets of `account_id` could draw from on `date`.
    pub fn list_available(
        book: &LedgerBook,
        account_id: Uuid,
        date: NaiveDate,
    ) -> CoreResult<Vec<&Credit>> {
        let account = book
            .account(account_id)
            .ok_or(CoreError::AccountNotFound(account_id))?;
        let mut credits: Vec<&Credit> = book
            .credits
            .iter()
            .filter(|credit| credit.covers_account(account))
            .filter(|credit| Self::credit_is_available(book, credit, date))
            .collect();
        credits.sort_by_key(|credit| (credit.start_date, credit.end_date));
        Ok(credits)
    }

    pub fn get_spend_data(
        book: &LedgerBook,
        credit_id: Uuid,
        filter: SpendFilter,
    ) -> CoreResult<SpendTotals> {
        if book.credit(credit_id).is_none() {
            return Err(CoreError::CreditNotFound(credit_id));
        }
        Ok(SpendService::credit_spend(book, credit_id, filter))
    }

    /// Runs every credit check and returns all failures.
    pub fn clean(
        book: &LedgerBook,
        previous: Option<&Credit>,
        candidate: &Credit,
    ) -> Vec<ValidationError> {
        let allocated = Self::get_allocated_amount(book, candidate.id);
        let refunds = Self::get_refund_amount(book, candidate.id);
        let latest_budget_end = book
            .budgets_of_credit(candidate.id)
            .map(|budget| budget.end_date)
            .max();

        let mut failures = Vec::new();
        failures.extend(validate_editable(previous, candidate));
        failures.extend(validate_end_date(previous, candidate));
        failures.extend(validate_license_fee(candidate));
        failures.extend(validate_flat_fee(candidate, allocated));
        failures.extend(validate_amount(previous, candidate, allocated, refunds));
        failures.extend(validate_status(previous, candidate));
        failures.extend(validate_signed_end_date(candidate, latest_budget_end));
        failures
    }

    pub(crate) fn available_for(book: &LedgerBook, credit: &Credit) -> Decimal {
        credit.effective_amount() + Self::get_refund_amount(book, credit.id)
            - Self::get_allocated_amount(book, credit.id)
    }

    fn credit_is_available(book: &LedgerBook, credit: &Credit, date: NaiveDate) -> bool {
        credit.end_date >= date
            && credit.is_signed()
            && Self::available_for(book, credit) > Decimal::ZERO
    }

    fn commit(
        book: &mut LedgerBook,
        ctx: &LedgerContext,
        previous: &Credit,
        candidate: Credit,
        actor: &str,
    ) -> CoreResult<()> {
        let changes = credit_changes(Some(previous), &candidate);
        if changes.is_empty() {
            return Ok(());
        }
        let record = changes.into_record(
            EntityKind::Credit,
            candidate.id,
            ActionKind::Updated,
            actor,
            ctx.clock.now(),
        );
        ctx.audit.record(record)?;
        let id = candidate.id;
        book.replace_credit(candidate);
        book.touch();
        tracing::info!(credit = %id, "credit updated");
        Ok(())
    }
}

fn validate_editable(previous: Option<&Credit>, candidate: &Credit) -> Vec<ValidationError> {
    match previous {
        Some(previous)
            if !previous.is_editable()
                && (previous.start_date != candidate.start_date
                    || previous.license_fee != candidate.license_fee) =>
        {
            vec![ValidationError::CreditNotEditable]
        }
        _ => Vec::new(),
    }
}

fn validate_end_date(previous: Option<&Credit>, candidate: &Credit) -> Vec<ValidationError> {
    let mut failures = Vec::new();
    if let Some(previous) = previous {
        if candidate.end_date < previous.end_date {
            failures.push(ValidationError::EndDateInvalid {
                previous: previous.end_date,
            });
        }
    }
    if candidate.end_date < candidate.start_date {
        failures.push(ValidationError::EndDateBeforeStartDate);
    }
    failures
}

fn validate_license_fee(candidate: &Credit) -> Vec<ValidationError> {
    if candidate.license_fee < Decimal::ZERO || candidate.license_fee >= Decimal::ONE {
        vec![ValidationError::LicenseFeeInvalid]
    } else {
        Vec::new()
    }
}

fn validate_flat_fee(candidate: &Credit, allocated: Decimal) -> Vec<ValidationError> {
    if candidate.flat_fee_cc <= 0 {
        return Vec::new();
    }
    let available = candidate.effective_amount() - allocated;
    if candidate.flat_fee() > available {
        vec![ValidationError::FlatFeeExceedsAvailableAmount { available }]
    } else {
        Vec::new()
    }
}

fn validate_amount(
    previous: Option<&Credit>,
    candidate: &Credit,
    allocated: Decimal,
    refunds: Decimal,
) -> Vec<ValidationError> {
    if candidate.amount < 0 {
        return vec![ValidationError::CreditAmountNegative];
    }
    match previous {
        Some(previous)
            if candidate.amount < previous.amount
                && candidate.effective_amount() + refunds < allocated =>
        {
            vec![ValidationError::CreditAmountTooLow { allocated }]
        }
        _ => Vec::new(),
    }
}

fn validate_status(previous: Option<&Credit>, candidate: &Credit) -> Vec<ValidationError> {
    match previous {
        Some(previous)
            if previous.status != CreditStatus::Pending
                && candidate.status == CreditStatus::Pending =>
        {
            vec![ValidationError::CreditStatusInvalid]
        }
        _ => Vec::new(),
    }
}

fn validate_signed_end_date(
    candidate: &Credit,
    latest_budget_end: Option<NaiveDate>,
) -> Vec<ValidationError> {
    match latest_budget_end {
        Some(latest_budget_end)
            if candidate.is_signed() && candidate.end_date < latest_budget_end =>
        {
            vec![ValidationError::CreditEndDateBeforeBudgets { latest_budget_end }]
        }
        _ => Vec::new(),
    }
}

fn credit_changes(previous: Option<&Credit>, current: &Credit) -> ChangeSet {
    let mut changes = ChangeSet::new();
    changes.track("Owner", previous.map(|c| &c.owner), &current.owner);
    changes.track("Start date", previous.map(|c| &c.start_date), &current.start_date);
    changes.track("End date", previous.map(|c| &c.end_date), &current.end_date);
    changes.track("Amount", previous.map(|c| &c.amount), &current.amount);
    changes.track("License fee", previous.map(|c| &c.license_fee), &current.license_fee);
    changes.track("Flat fee", previous.map(Credit::flat_fee).as_ref(), &current.flat_fee());
    changes.track_opt(
        "Flat fee start date",
        previous.map(|c| &c.flat_fee_start_date),
        &current.flat_fee_start_date,
    );
    changes.track_opt(
        "Flat fee end date",
        previous.map(|c| &c.flat_fee_end_date),
        &current.flat_fee_end_date,
    );
    changes.track("Status", previous.map(|c| &c.status), &current.status);
    changes.track("Currency", previous.map(|c| &c.currency), &current.currency);
    changes.track_opt("Comment", previous.map(|c| &c.comment), &current.comment);
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use bcm_domain::{Budget, Refund};
    use rust_decimal_macros::dec;

    #[test]
    fn create_requires_exactly_one_owner() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let mut request = NewCredit::for_account(
            fx.account_id,
            date(2024, 1, 1),
            date(2024, 12, 31),
            1_000,
            CurrencyCode::usd(),
        );
        request.agency_id = Some(fx.agency_id);

        let err = CreditService::create(&mut fx.book, &ctx, request, ACTOR).unwrap_err();
        assert_eq!(
            err.failures().unwrap().errors(),
            &[ValidationError::CreditOwnerInvalid]
        );
        assert!(fx.book.credits.is_empty());
    }

    #[test]
    fn owner_failure_is_reported_with_the_other_failures() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let mut request = NewCredit::for_account(
            fx.account_id,
            date(2024, 6, 1),
            date(2024, 5, 1),
            -5,
            CurrencyCode::usd(),
        );
        request.agency_id = Some(fx.agency_id);
        request.license_fee = dec!(1.5);

        let err = CreditService::create(&mut fx.book, &ctx, request, ACTOR).unwrap_err();
        let failures = err.failures().unwrap();
        assert_eq!(failures.errors()[0], ValidationError::CreditOwnerInvalid);
        assert!(failures.any(|e| *e == ValidationError::EndDateBeforeStartDate));
        assert!(failures.any(|e| *e == ValidationError::CreditAmountNegative));
        assert!(failures.any(|e| *e == ValidationError::LicenseFeeInvalid));
        assert_eq!(failures.len(), 4);
    }

    #[test]
    fn create_starts_pending_audits_and_notifies() {
        let mut fx = Fixture::new();
        let (ctx, audit, notes) = fx.recording_context();
        let request = NewCredit::for_agency(
            fx.agency_id,
            date(2024, 1, 1),
            date(2024, 12, 31),
            5_000,
            CurrencyCode::new("eur"),
        )
        .with_comment("annual");

        let id = CreditService::create(&mut fx.book, &ctx, request, ACTOR).unwrap();
        let credit = fx.book.credit(id).unwrap();
        assert_eq!(credit.status, CreditStatus::Pending);
        assert_eq!(credit.created_by.as_deref(), Some(ACTOR));

        let records = audit.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, ActionKind::Created);
        assert!(records[0].summary().contains("Amount set to \"5000\""));

        let events = notes.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].owner_name, "Mediahaus");
        assert_eq!(events[0].currency_symbol, "€");
    }

    #[test]
    fn validation_reports_every_failure() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let credit_id = fx.signed_credit(1_000);
        let patch = CreditPatch {
            start_date: Some(date(2024, 2, 1)),
            end_date: Some(date(2024, 6, 30)),
            license_fee: Some(dec!(1.2)),
            status: Some(CreditStatus::Pending),
            ..CreditPatch::default()
        };

        let err = CreditService::update(&mut fx.book, &ctx, credit_id, patch, ACTOR).unwrap_err();
        let failures = err.failures().unwrap();
        assert!(failures.any(|e| *e == ValidationError::CreditNotEditable));
        assert!(failures.any(|e| matches!(e, ValidationError::EndDateInvalid { .. })));
        assert!(failures.any(|e| *e == ValidationError::LicenseFeeInvalid));
        assert!(failures.any(|e| *e == ValidationError::CreditStatusInvalid));
        assert_eq!(fx.book.credit(credit_id).unwrap().end_date, date(2024, 12, 31));
    }

    #[test]
    fn amount_cannot_drop_below_allocations() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let credit_id = fx.signed_credit(1_000);
        fx.insert_budget(credit_id, date(2024, 3, 1), date(2024, 3, 31), 600);

        let lower = CreditPatch {
            amount: Some(500),
            ..CreditPatch::default()
        };
        let err = CreditService::update(&mut fx.book, &ctx, credit_id, lower, ACTOR).unwrap_err();
        assert_eq!(
            err.failures().unwrap().errors(),
            &[ValidationError::CreditAmountTooLow { allocated: dec!(600) }]
        );

        let still_fits = CreditPatch {
            amount: Some(600),
            ..CreditPatch::default()
        };
        CreditService::update(&mut fx.book, &ctx, credit_id, still_fits, ACTOR).unwrap();
        assert_eq!(fx.book.credit(credit_id).unwrap().amount, 600);
    }

    #[test]
    fn flat_fee_cannot_exceed_unallocated_amount() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let credit_id = fx.signed_credit(1_000);
        fx.insert_budget(credit_id, date(2024, 3, 1), date(2024, 3, 31), 600);

        // 300 fits in amount minus allocations (400) but not once the fee itself is taken out.
        let patch = CreditPatch {
            flat_fee_cc: Some(3_000_000),
            ..CreditPatch::default()
        };
        let err = CreditService::update(&mut fx.book, &ctx, credit_id, patch, ACTOR).unwrap_err();
        assert_eq!(
            err.failures().unwrap().errors(),
            &[ValidationError::FlatFeeExceedsAvailableAmount { available: dec!(100) }]
        );
        assert_eq!(fx.book.credit(credit_id).unwrap().flat_fee_cc, 0);

        let fits = CreditPatch {
            flat_fee_cc: Some(2_000_000),
            ..CreditPatch::default()
        };
        CreditService::update(&mut fx.book, &ctx, credit_id, fits, ACTOR).unwrap();
        assert_eq!(fx.book.credit(credit_id).unwrap().flat_fee(), dec!(200));
    }

    #[test]
    fn signed_credit_cannot_end_before_its_budgets() {
        let mut fx = Fixture::new();
        let credit_id = fx.signed_credit(1_000);
        fx.insert_budget(credit_id, date(2024, 3, 1), date(2024, 11, 30), 100);

        let mut candidate = fx.book.credit(credit_id).unwrap().clone();
        candidate.end_date = date(2024, 10, 31);
        let failures = CreditService::clean(&fx.book, None, &candidate);
        assert!(failures.contains(&ValidationError::CreditEndDateBeforeBudgets {
            latest_budget_end: date(2024, 11, 30)
        }));
    }

    #[test]
    fn cancel_is_idempotent_and_audited_once() {
        let mut fx = Fixture::new();
        let (ctx, audit, _) = fx.recording_context();
        let credit_id = fx.signed_credit(1_000);

        CreditService::cancel(&mut fx.book, &ctx, credit_id, ACTOR).unwrap();
        CreditService::cancel(&mut fx.book, &ctx, credit_id, ACTOR).unwrap();

        assert!(fx.book.credit(credit_id).unwrap().is_canceled());
        assert_eq!(audit.records().len(), 1);
        assert_eq!(
            audit.records()[0].summary(),
            "Status changed from \"Signed\" to \"Canceled\""
        );
    }

    #[test]
    fn delete_only_while_pending() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let signed = fx.signed_credit(1_000);
        assert!(matches!(
            CreditService::delete(&mut fx.book, &ctx, signed, ACTOR),
            Err(CoreError::InvalidOperation(_))
        ));

        let pending = fx.pending_credit(1_000);
        CreditService::delete(&mut fx.book, &ctx, pending, ACTOR).unwrap();
        assert!(fx.book.credit(pending).is_none());
    }

    #[test]
    fn availability_tracks_status_dates_and_allocation() {
        let mut fx = Fixture::new();
        let credit_id = fx.signed_credit(1_000);
        assert!(CreditService::is_available(&fx.book, credit_id, date(2024, 6, 1)).unwrap());
        assert!(!CreditService::is_available(&fx.book, credit_id, date(2025, 1, 1)).unwrap());

        fx.insert_budget(credit_id, date(2024, 3, 1), date(2024, 3, 31), 1_000);
        assert!(!CreditService::is_available(&fx.book, credit_id, date(2024, 6, 1)).unwrap());

        fx.book.add_refund(Refund::new(fx.account_id, credit_id, date(2024, 3, 1), 50));
        assert_eq!(
            CreditService::get_available_amount(&fx.book, credit_id).unwrap(),
            dec!(50)
        );
        let listed = CreditService::list_available(&fx.book, fx.account_id, date(2024, 6, 1)).unwrap();
        assert_eq!(listed.len(), 1);

        let pending = fx.pending_credit(1_000);
        assert!(!CreditService::is_available(&fx.book, pending, date(2024, 6, 1)).unwrap());
    }

    #[test]
    fn allocated_amount_excludes_freed_reserve() {
        let mut fx = Fixture::new();
        let credit_id = fx.signed_credit(1_000);
        let mut budget = Budget::new(
            fx.campaign_id,
            credit_id,
            date(2024, 3, 1),
            date(2024, 3, 31),
            300,
        );
        budget.freed_cc = 1_000_000;
        fx.book.add_budget(budget);
        assert_eq!(CreditService::get_allocated_amount(&fx.book, credit_id), dec!(200));
    }
}
