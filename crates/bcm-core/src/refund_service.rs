//! Refunds: month-aligned amounts handed back to a credit.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

use bcm_domain::{first_day_of_month, Credit, LedgerBook, Refund};

use crate::{
    audit::{ActionKind, ChangeSet, EntityKind},
    collaborators::LedgerContext,
    credit_service::CreditService,
    error::{CoreError, CoreResult, ValidationError, ValidationFailures},
    spend_service::{SpendFilter, SpendService},
};

#[derive(Debug, Clone)]
pub struct NewRefund {
    pub account_id: Uuid,
    pub credit_id: Uuid,
    /// Has to be the first day of a month.
    pub start_date: NaiveDate,
    pub amount: i64,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RefundPatch {
    pub start_date: Option<NaiveDate>,
    pub amount: Option<i64>,
    pub comment: Option<Option<String>>,
}

impl RefundPatch {
    fn apply(&self, refund: &mut Refund) {
        if let Some(start_date) = self.start_date {
            refund.set_start_date(start_date);
        }
        if let Some(amount) = self.amount {
            refund.amount = amount;
        }
        if let Some(comment) = &self.comment {
            refund.comment = comment.clone();
        }
    }
}

pub struct RefundService;

impl RefundService {
    pub fn create(
        book: &mut LedgerBook,
        ctx: &LedgerContext,
        request: NewRefund,
        actor: &str,
    ) -> CoreResult<Uuid> {
        if book.account(request.account_id).is_none() {
            return Err(CoreError::AccountNotFound(request.account_id));
        }
        let mut refund = Refund::new(
            request.account_id,
            request.credit_id,
            request.start_date,
            request.amount,
        );
        refund.comment = request.comment;
        refund.created_by = Some(actor.to_string());
        refund.created_at = ctx.clock.now();

        ValidationFailures::check(Self::clean(book, 0, &refund)?)?;

        let record = refund_changes(None, &refund).into_record(
            EntityKind::Refund,
            refund.id,
            ActionKind::Created,
            actor,
            ctx.clock.now(),
        );
        ctx.audit.record(record)?;
        let id = book.add_refund(refund);
        tracing::info!(refund = %id, credit = %request.credit_id, "refund created");
        Ok(id)
    }

    pub fn update(
        book: &mut LedgerBook,
        ctx: &LedgerContext,
        refund_id: Uuid,
        patch: RefundPatch,
        actor: &str,
    ) -> CoreResult<()> {
        let previous = book
            .refund(refund_id)
            .cloned()
            .ok_or(CoreError::RefundNotFound(refund_id))?;
        let mut candidate = previous.clone();
        patch.apply(&mut candidate);

        ValidationFailures::check(Self::clean(book, previous.amount, &candidate)?)?;

        let changes = refund_changes(Some(&previous), &candidate);
        if changes.is_empty() {
            return Ok(());
        }
        let record = changes.into_record(
            EntityKind::Refund,
            refund_id,
            ActionKind::Updated,
            actor,
            ctx.clock.now(),
        );
        ctx.audit.record(record)?;
        book.replace_refund(candidate);
        book.touch();
        tracing::info!(refund = %refund_id, "refund updated");
        Ok(())
    }

    /// Removal counts as setting the amount to zero, so it has to pass the
    /// same checks as any other update.
    pub fn delete(
        book: &mut LedgerBook,
        ctx: &LedgerContext,
        refund_id: Uuid,
        actor: &str,
    ) -> CoreResult<()> {
        let previous = book
            .refund(refund_id)
            .cloned()
            .ok_or(CoreError::RefundNotFound(refund_id))?;
        let mut zeroed = previous.clone();
        zeroed.amount = 0;
        ValidationFailures::check(Self::clean(book, previous.amount, &zeroed)?)?;

        let mut changes = ChangeSet::new();
        changes.track("Amount", Some(&previous.amount), &zeroed.amount);
        let record = changes.into_record(
            EntityKind::Refund,
            refund_id,
            ActionKind::Deleted,
            actor,
            ctx.clock.now(),
        );
        ctx.audit.record(record)?;
        book.remove_refund(refund_id);
        book.touch();
        tracing::info!(refund = %refund_id, "refund deleted");
        Ok(())
    }

    /// Checks `candidate` as if it replaced a refund of `previous_amount`.
    pub fn clean(
        book: &LedgerBook,
        previous_amount: i64,
        candidate: &Refund,
    ) -> CoreResult<Vec<ValidationError>> {
        let credit = book
            .credit(candidate.credit_id)
            .ok_or(CoreError::CreditNotFound(candidate.credit_id))?;

        let mut failures = Vec::new();
        failures.extend(validate_start_date(candidate, credit));
        failures.extend(validate_amount(book, candidate, credit));
        failures.extend(validate_credit_balance(book, previous_amount, candidate, credit));
        Ok(failures)
    }
}

fn validate_start_date(candidate: &Refund, credit: &Credit) -> Vec<ValidationError> {
    let mut failures = Vec::new();
    if candidate.start_date.day() != 1 {
        failures.push(ValidationError::StartDateInvalid);
    }
    let earliest = first_day_of_month(credit.start_date);
    if candidate.start_date < earliest || candidate.start_date > credit.end_date {
        failures.push(ValidationError::RefundOutsideCredit {
            credit_start: earliest,
            credit_end: credit.end_date,
        });
    }
    failures
}

fn validate_amount(book: &LedgerBook, candidate: &Refund, credit: &Credit) -> Vec<ValidationError> {
    if candidate.amount < 0 {
        return vec![ValidationError::RefundAmountNegative];
    }
    let total_spend = SpendService::credit_spend(book, credit.id, SpendFilter::all()).local_etfm_total;
    if Decimal::from(candidate.amount) > total_spend {
        vec![ValidationError::RefundAmountExceededTotalSpend { total_spend }]
    } else {
        Vec::new()
    }
}

fn validate_credit_balance(
    book: &LedgerBook,
    previous_amount: i64,
    candidate: &Refund,
    credit: &Credit,
) -> Vec<ValidationError> {
    let available = CreditService::available_for(book, credit)
        + Decimal::from(candidate.amount - previous_amount);
    if available < Decimal::ZERO {
        vec![ValidationError::CreditAvailableAmountNegative { available }]
    } else {
        Vec::new()
    }
}

fn refund_changes(previous: Option<&Refund>, current: &Refund) -> ChangeSet {
    let mut changes = ChangeSet::new();
    changes.track("Account", previous.map(|r| &r.account_id), &current.account_id);
    changes.track("Credit", previous.map(|r| &r.credit_id), &current.credit_id);
    changes.track("Start date", previous.map(|r| &r.start_date), &current.start_date);
    changes.track("End date", previous.map(|r| &r.end_date), &current.end_date);
    changes.track("Amount", previous.map(|r| &r.amount), &current.amount);
    changes.track_opt("Comment", previous.map(|r| &r.comment), &current.comment);
    changes
}
