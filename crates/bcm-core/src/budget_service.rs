//! Budgets: time-boxed slices of a credit assigned to one campaign.
//!
//! State and available amounts are always recomputed from dates and the
//! statements recorded so far; nothing derived is stored on the budget apart
//! from `freed_cc`.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

use bcm_domain::{
    money, Account, Budget, BudgetState, Campaign, Credit, CreditStatus, CurrencyCode, LedgerBook,
};

use crate::{
    audit::{ActionKind, ChangeSet, EntityKind},
    collaborators::{convert_amount, CreationEvent, LedgerContext},
    credit_service::CreditService,
    error::{CoreError, CoreResult, ValidationError, ValidationFailures},
    fee_math::FeeContext,
    overlap,
    spend_service::{SpendFilter, SpendService, SpendTotals},
};

#[derive(Debug, Clone)]
pub struct NewBudget {
    pub campaign_id: Uuid,
    pub credit_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount: i64,
    pub margin: Decimal,
    pub comment: Option<String>,
}

impl NewBudget {
    pub fn new(
        campaign_id: Uuid,
        credit_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        amount: i64,
    ) -> Self {
        Self {
            campaign_id,
            credit_id,
            start_date,
            end_date,
            amount,
            margin: Decimal::ZERO,
            comment: None,
        }
    }

    pub fn with_margin(mut self, margin: Decimal) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Partial update. `margin` and `credit_id` are accepted so that attempts to
/// change them are reported instead of silently ignored.
#[derive(Debug, Clone, Default)]
pub struct BudgetPatch {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub amount: Option<i64>,
    pub margin: Option<Decimal>,
    pub credit_id: Option<Uuid>,
    pub freed_cc: Option<i64>,
    pub comment: Option<Option<String>>,
}

impl BudgetPatch {
    pub fn amount(amount: i64) -> Self {
        Self {
            amount: Some(amount),
            ..Self::default()
        }
    }

    fn apply(&self, budget: &mut Budget) {
        if let Some(start_date) = self.start_date {
            budget.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            budget.end_date = end_date;
        }
        if let Some(amount) = self.amount {
            budget.amount = amount;
        }
        if let Some(margin) = self.margin {
            budget.margin = margin;
        }
        if let Some(credit_id) = self.credit_id {
            budget.credit_id = credit_id;
        }
        if let Some(freed_cc) = self.freed_cc {
            budget.freed_cc = freed_cc;
        }
        if let Some(comment) = &self.comment {
            budget.comment = comment.clone();
        }
    }
}

/// Everything one validation pass looks at.
struct BudgetCheck<'a> {
    book: &'a LedgerBook,
    ctx: &'a LedgerContext,
    previous: Option<&'a Budget>,
    candidate: &'a Budget,
    credit: &'a Credit,
    campaign: &'a Campaign,
    account: &'a Account,
    /// State of the committed budget today; `None` while creating.
    state: Option<BudgetState>,
}

impl<'a> BudgetCheck<'a> {
    fn run(&self) -> Vec<ValidationError> {
        let mut failures = Vec::new();
        failures.extend(self.validate_margin_unchanged());
        failures.extend(self.validate_state_allows_change());
        failures.extend(self.validate_dates_not_past());
        failures.extend(self.validate_credit());
        failures.extend(self.validate_dates_in_credit());
        failures.extend(self.validate_margin());
        failures.extend(self.validate_license_fee());
        failures.extend(self.validate_amount());
        failures.extend(self.validate_amount_lowering());
        failures.extend(self.validate_credit_sum());
        failures
    }

    fn campaign_siblings(&self) -> impl Iterator<Item = &'a Budget> {
        let id = self.candidate.id;
        self.book
            .budgets_of_campaign(self.campaign.id)
            .filter(move |budget| budget.id != id)
    }

    fn validate_margin_unchanged(&self) -> Vec<ValidationError> {
        match self.previous {
            Some(previous) if previous.margin != self.candidate.margin => {
                vec![ValidationError::CanNotChangeMargin]
            }
            _ => Vec::new(),
        }
    }

    fn validate_state_allows_change(&self) -> Vec<ValidationError> {
        let (Some(previous), Some(state)) = (self.previous, self.state) else {
            return Vec::new();
        };
        let mut failures = Vec::new();
        if previous.start_date != self.candidate.start_date && state != BudgetState::Pending {
            failures.push(ValidationError::CanNotChangeStartDate);
        }
        let other_change = previous.end_date != self.candidate.end_date
            || previous.amount != self.candidate.amount;
        if other_change && !state.is_editable() {
            failures.push(ValidationError::BudgetNotEditable { state });
        }
        failures
    }

    fn validate_dates_not_past(&self) -> Vec<ValidationError> {
        if self.previous.is_some() {
            return Vec::new();
        }
        let today = self.ctx.today();
        let mut failures = Vec::new();
        if self.candidate.start_date < today {
            failures.push(ValidationError::StartDateInThePast);
        }
        if self.candidate.end_date < today {
            failures.push(ValidationError::EndDateInThePast);
        }
        failures
    }

    fn validate_credit(&self) -> Vec<ValidationError> {
        let mut failures = Vec::new();
        match self.previous {
            None if self.credit.is_canceled() => failures.push(ValidationError::CreditCanceled),
            Some(previous) if previous.credit_id != self.candidate.credit_id => {
                failures.push(ValidationError::CanNotChangeCredit)
            }
            _ => {}
        }
        if self.credit.status == CreditStatus::Pending {
            failures.push(ValidationError::CreditPending);
        }
        if self.credit.currency != self.account.currency {
            failures.push(ValidationError::CurrencyInconsistent {
                credit: self.credit.currency.clone(),
                account: self.account.currency.clone(),
            });
        }
        if !self.credit.covers_account(self.account) {
            failures.push(ValidationError::CreditNotCoveringCampaign);
        }
        failures
    }

    fn validate_dates_in_credit(&self) -> Vec<ValidationError> {
        let mut failures = Vec::new();
        if self.candidate.start_date < self.credit.start_date {
            failures.push(ValidationError::StartDateBeforeCredit {
                credit_start: self.credit.start_date,
            });
        }
        if self.candidate.end_date > self.credit.end_date {
            failures.push(ValidationError::EndDateAfterCredit {
                credit_end: self.credit.end_date,
            });
        }
        if self.candidate.end_date < self.candidate.start_date {
            failures.push(ValidationError::EndDateBeforeStartDate);
        }
        failures
    }

    fn validate_margin(&self) -> Vec<ValidationError> {
        let margin = self.candidate.margin;
        if margin < Decimal::ZERO || margin >= Decimal::ONE {
            return vec![ValidationError::MarginRangeInvalid];
        }
        if !self.account.uses_bcm_v2 {
            return Vec::new();
        }
        let margins = overlap::values_on_overlap(
            self.candidate.date_range(),
            self.campaign_siblings(),
            Budget::date_range,
            |budget| budget.margin,
        );
        if margins.iter().any(|other| *other != margin) {
            vec![ValidationError::OverlappingBudgetMarginInvalid]
        } else {
            Vec::new()
        }
    }

    fn validate_license_fee(&self) -> Vec<ValidationError> {
        if !self.account.uses_bcm_v2 {
            return Vec::new();
        }
        let book = self.book;
        let fees = overlap::values_on_overlap(
            self.candidate.date_range(),
            self.campaign_siblings(),
            Budget::date_range,
            |budget| book.credit(budget.credit_id).map(|credit| credit.license_fee),
        );
        if fees
            .iter()
            .flatten()
            .any(|fee| *fee != self.credit.license_fee)
        {
            vec![ValidationError::OverlappingBudgets]
        } else {
            Vec::new()
        }
    }

    fn validate_amount(&self) -> Vec<ValidationError> {
        let mut failures = Vec::new();
        if self.candidate.amount < 0 {
            failures.push(ValidationError::BudgetAmountNegative);
        }
        if let Some(previous) = self.previous {
            if self.credit.is_canceled() && previous.amount != self.candidate.amount {
                failures.push(ValidationError::CanNotChangeBudgetAmount);
            }
        }
        failures
    }

    fn validate_amount_lowering(&self) -> Vec<ValidationError> {
        let (Some(previous), Some(state)) = (self.previous, self.state) else {
            return Vec::new();
        };
        if self.candidate.amount >= previous.amount || state == BudgetState::Pending {
            return Vec::new();
        }
        if self.campaign.real_time_campaign_stop {
            return match self
                .ctx
                .campaign_stop
                .validate_minimum_budget_amount(previous, self.candidate.amount)
            {
                Ok(()) => Vec::new(),
                Err(err) => vec![ValidationError::BudgetAmountTooLow {
                    min_amount: err.min_amount,
                }],
            };
        }
        if self.ctx.policy.lowering_allow_list.contains(&self.account.id) {
            return Vec::new();
        }
        vec![ValidationError::CampaignStopDisabled]
    }

    fn validate_credit_sum(&self) -> Vec<ValidationError> {
        let id = self.candidate.id;
        let siblings: Decimal = self
            .book
            .budgets_of_credit(self.credit.id)
            .filter(|budget| budget.id != id)
            .map(Budget::allocated_amount)
            .sum();
        let refunds = CreditService::get_refund_amount(self.book, self.credit.id);
        let remaining = self.credit.effective_amount() + refunds
            - siblings
            - self.candidate.allocated_amount();
        if remaining < Decimal::ZERO {
            vec![ValidationError::BudgetAmountExceededCreditAmount {
                overflow: -remaining,
            }]
        } else {
            Vec::new()
        }
    }
}

pub struct BudgetService;

impl BudgetService {
    pub fn create(
        book: &mut LedgerBook,
        ctx: &LedgerContext,
        request: NewBudget,
        actor: &str,
    ) -> CoreResult<Uuid> {
        let mut budget = Budget::new(
            request.campaign_id,
            request.credit_id,
            request.start_date,
            request.end_date,
            request.amount,
        );
        budget.margin = request.margin;
        budget.comment = request.comment;
        budget.created_by = Some(actor.to_string());
        budget.created_at = ctx.clock.now();

        ValidationFailures::check(Self::clean(book, ctx, None, &budget)?)?;

        let view: &LedgerBook = book;
        let campaign = view
            .campaign(request.campaign_id)
            .ok_or(CoreError::CampaignNotFound(request.campaign_id))?;
        let today = ctx.today();
        let live = view
            .budgets_of_campaign(campaign.id)
            .filter(|budget| {
                matches!(
                    Self::state_of(view, budget, today),
                    BudgetState::Pending | BudgetState::Active
                )
            })
            .count();
        ctx.entity_limits.check_budget_limit(campaign, live)?;

        let record = budget_changes(None, &budget).into_record(
            EntityKind::Budget,
            budget.id,
            ActionKind::Created,
            actor,
            ctx.clock.now(),
        );
        ctx.audit.record(record)?;

        let event = Self::creation_event(book, &budget);
        let id = book.add_budget(budget);
        tracing::info!(budget = %id, campaign = %request.campaign_id, "budget created");
        if let Some(event) = event {
            ctx.announce(event);
        }
        Ok(id)
    }

    pub fn update(
        book: &mut LedgerBook,
        ctx: &LedgerContext,
        budget_id: Uuid,
        patch: BudgetPatch,
        actor: &str,
    ) -> CoreResult<()> {
        let previous = book
            .budget(budget_id)
            .cloned()
            .ok_or(CoreError::BudgetNotFound(budget_id))?;
        let mut candidate = previous.clone();
        patch.apply(&mut candidate);

        ValidationFailures::check(Self::clean(book, ctx, Some(&previous), &candidate)?)?;

        let changes = budget_changes(Some(&previous), &candidate);
        if changes.is_empty() {
            return Ok(());
        }
        let record = changes.into_record(
            EntityKind::Budget,
            budget_id,
            ActionKind::Updated,
            actor,
            ctx.clock.now(),
        );
        ctx.audit.record(record)?;
        book.replace_budget(candidate);
        book.touch();
        tracing::info!(budget = %budget_id, "budget updated");
        Ok(())
    }

    pub fn delete(
        book: &mut LedgerBook,
        ctx: &LedgerContext,
        budget_id: Uuid,
        actor: &str,
    ) -> CoreResult<()> {
        let state = Self::state(book, budget_id, ctx.today())?;
        if state != BudgetState::Pending {
            return Err(CoreError::InvalidOperation(format!(
                "budget {budget_id} is {state} and cannot be deleted"
            )));
        }
        let record = ChangeSet::new().into_record(
            EntityKind::Budget,
            budget_id,
            ActionKind::Deleted,
            actor,
            ctx.clock.now(),
        );
        ctx.audit.record(record)?;
        book.remove_budget(budget_id);
        book.touch();
        tracing::info!(budget = %budget_id, "budget deleted");
        Ok(())
    }

    /// Runs every budget check against the committed book.
    pub fn clean(
        book: &LedgerBook,
        ctx: &LedgerContext,
        previous: Option<&Budget>,
        candidate: &Budget,
    ) -> CoreResult<Vec<ValidationError>> {
        let credit = book
            .credit(candidate.credit_id)
            .ok_or(CoreError::CreditNotFound(candidate.credit_id))?;
        let campaign = book
            .campaign(candidate.campaign_id)
            .ok_or(CoreError::CampaignNotFound(candidate.campaign_id))?;
        let account = book
            .account(campaign.account_id)
            .ok_or(CoreError::AccountNotFound(campaign.account_id))?;
        let state = previous.map(|budget| Self::state_of(book, budget, ctx.today()));

        let check = BudgetCheck {
            book,
            ctx,
            previous,
            candidate,
            credit,
            campaign,
            account,
            state,
        };
        Ok(check.run())
    }

    pub fn state(book: &LedgerBook, budget_id: Uuid, date: NaiveDate) -> CoreResult<BudgetState> {
        let budget = Self::budget(book, budget_id)?;
        Ok(Self::state_of(book, budget, date))
    }

    /// Allocation left on `date` after effective + fee spend.
    pub fn get_available_amount(
        book: &LedgerBook,
        budget_id: Uuid,
        date: NaiveDate,
    ) -> CoreResult<Decimal> {
        let budget = Self::budget(book, budget_id)?;
        Ok(Self::available_on(book, budget, date, false))
    }

    /// Allocation left on `date` after effective + fee + margin spend.
    pub fn get_available_etfm_amount(
        book: &LedgerBook,
        budget_id: Uuid,
        date: NaiveDate,
    ) -> CoreResult<Decimal> {
        let budget = Self::budget(book, budget_id)?;
        Ok(Self::available_on(book, budget, date, true))
    }

    pub fn get_available_amount_in(
        book: &LedgerBook,
        ctx: &LedgerContext,
        budget_id: Uuid,
        date: NaiveDate,
        currency: &CurrencyCode,
    ) -> CoreResult<Decimal> {
        let available = Self::get_available_amount(book, budget_id, date)?;
        Self::to_currency(book, ctx, budget_id, available, date, currency)
    }

    pub fn get_available_etfm_amount_in(
        book: &LedgerBook,
        ctx: &LedgerContext,
        budget_id: Uuid,
        date: NaiveDate,
        currency: &CurrencyCode,
    ) -> CoreResult<Decimal> {
        let available = Self::get_available_etfm_amount(book, budget_id, date)?;
        Self::to_currency(book, ctx, budget_id, available, date, currency)
    }

    pub fn get_ideal_budget_spend(
        book: &LedgerBook,
        budget_id: Uuid,
        date: NaiveDate,
    ) -> CoreResult<Decimal> {
        Ok(Self::budget(book, budget_id)?.get_ideal_budget_spend(date))
    }

    pub fn get_spend_data(
        book: &LedgerBook,
        budget_id: Uuid,
        filter: SpendFilter,
    ) -> CoreResult<SpendTotals> {
        Self::budget(book, budget_id)?;
        Ok(SpendService::budget_spend(book, budget_id, filter))
    }

    /// Hands the unspent part of an inactive budget back to its credit.
    ///
    /// Until the settlement window has passed a reserve derived from the
    /// second-to-last statement is held back, and only the first call
    /// releases anything. Returns the budget's `freed_cc` afterwards.
    pub fn free_inactive_allocated_assets(
        book: &mut LedgerBook,
        ctx: &LedgerContext,
        budget_id: Uuid,
        actor: &str,
    ) -> CoreResult<i64> {
        let today = ctx.today();
        let budget = Self::budget(book, budget_id)?;
        let state = Self::state_of(book, budget, today);
        if state != BudgetState::Inactive {
            return Err(CoreError::InvalidOperation(format!(
                "budget {budget_id} is {state}; only inactive budgets can be freed"
            )));
        }

        let statements = book.statements_of_budget(budget_id);
        let Some(reserve_row) = statements.len().checked_sub(2).map(|i| statements[i]) else {
            tracing::debug!(budget = %budget_id, "not enough statements to compute a reserve");
            return Ok(budget.freed_cc);
        };
        let policy = &ctx.policy;
        let reserve = money::nano_to_decimal(reserve_row.local_effective_spend_nano())
            * (policy.reserve_factor + policy.reserve_factor_offset);
        let reserve_cc = money::decimal_to_cc(reserve);

        let uses_bcm_v2 = book
            .campaign_account(budget.campaign_id)
            .map(|account| account.uses_bcm_v2)
            .unwrap_or(false);
        let totals = SpendService::budget_spend(book, budget_id, SpendFilter::all());
        let spend = if uses_bcm_v2 {
            totals.local_etfm_total
        } else {
            totals.local_et_total
        };
        let spend_cc = money::decimal_to_cc(spend);
        let amount_cc = budget.amount_cc();

        let settled_after = budget.end_date + Duration::days(policy.report_settlement_days);
        let freed_cc = if today > settled_after {
            (amount_cc - spend_cc).max(0)
        } else if budget.freed_cc == 0 {
            (amount_cc - spend_cc - reserve_cc).max(0)
        } else {
            return Ok(budget.freed_cc);
        };
        let freed_cc = freed_cc.max(budget.freed_cc);
        if freed_cc == budget.freed_cc {
            return Ok(freed_cc);
        }

        tracing::debug!(
            budget = %budget_id,
            spend_cc,
            reserve_cc,
            freed_cc,
            "releasing inactive allocation"
        );
        let patch = BudgetPatch {
            freed_cc: Some(freed_cc),
            ..BudgetPatch::default()
        };
        Self::update(book, ctx, budget_id, patch, actor)?;
        Ok(freed_cc)
    }

    /// Frees every budget that is inactive today. Failures are logged and
    /// skipped; returns the budgets whose `freed_cc` moved.
    pub fn settle_inactive(
        book: &mut LedgerBook,
        ctx: &LedgerContext,
        actor: &str,
    ) -> Vec<(Uuid, i64)> {
        let today = ctx.today();
        let view: &LedgerBook = book;
        let candidates: Vec<(Uuid, i64)> = view
            .budgets
            .iter()
            .filter(|budget| Self::state_of(view, budget, today) == BudgetState::Inactive)
            .map(|budget| (budget.id, budget.freed_cc))
            .collect();

        let mut settled = Vec::new();
        for (budget_id, before) in candidates {
            match Self::free_inactive_allocated_assets(book, ctx, budget_id, actor) {
                Ok(after) if after != before => settled.push((budget_id, after)),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(budget = %budget_id, "could not free budget: {err}");
                }
            }
        }
        settled
    }

    /// Margin of the campaign budget running on `date`.
    pub fn effective_margin_on(
        book: &LedgerBook,
        campaign_id: Uuid,
        date: NaiveDate,
    ) -> Option<Decimal> {
        overlap::value_on_date(
            date,
            book.budgets_of_campaign(campaign_id),
            Budget::date_range,
            |budget| budget.margin,
        )
    }

    /// License fee of the credit behind the campaign budget running on `date`.
    pub fn effective_license_fee_on(
        book: &LedgerBook,
        campaign_id: Uuid,
        date: NaiveDate,
    ) -> Option<Decimal> {
        overlap::value_on_date(
            date,
            book.budgets_of_campaign(campaign_id),
            Budget::date_range,
            |budget| book.credit(budget.credit_id).map(|credit| credit.license_fee),
        )
        .flatten()
    }

    /// Fee terms for bid and daily-budget bounds on `date`, if a budget runs then.
    pub fn fee_context_on(
        book: &LedgerBook,
        campaign_id: Uuid,
        date: NaiveDate,
    ) -> Option<FeeContext> {
        let margin = Self::effective_margin_on(book, campaign_id, date);
        let license_fee = Self::effective_license_fee_on(book, campaign_id, date);
        if margin.is_none() && license_fee.is_none() {
            return None;
        }
        Some(FeeContext {
            license_fee,
            margin,
        })
    }

    fn budget(book: &LedgerBook, budget_id: Uuid) -> CoreResult<&Budget> {
        book.budget(budget_id)
            .ok_or(CoreError::BudgetNotFound(budget_id))
    }

    pub(crate) fn state_of(book: &LedgerBook, budget: &Budget, date: NaiveDate) -> BudgetState {
        budget.state_on(date, Self::available_on(book, budget, date, true))
    }

    fn available_on(book: &LedgerBook, budget: &Budget, date: NaiveDate, with_margin: bool) -> Decimal {
        let totals = SpendService::budget_spend(book, budget.id, SpendFilter::up_to(date));
        let spend = if with_margin {
            totals.local_etfm_total
        } else {
            totals.local_etf_total
        };
        budget.allocated_amount() - spend
    }

    fn to_currency(
        book: &LedgerBook,
        ctx: &LedgerContext,
        budget_id: Uuid,
        amount: Decimal,
        date: NaiveDate,
        currency: &CurrencyCode,
    ) -> CoreResult<Decimal> {
        let budget = Self::budget(book, budget_id)?;
        let credit = book
            .credit(budget.credit_id)
            .ok_or(CoreError::CreditNotFound(budget.credit_id))?;
        convert_amount(ctx.exchange_rates.as_ref(), amount, &credit.currency, currency, date)
    }

    fn creation_event(book: &LedgerBook, budget: &Budget) -> Option<CreationEvent> {
        let account = book.campaign_account(budget.campaign_id)?;
        let credit = book.credit(budget.credit_id)?;
        Some(CreationEvent {
            entity: EntityKind::Budget,
            id: budget.id,
            owner_name: account.name.clone(),
            amount: budget.amount,
            currency_symbol: credit.currency.symbol(),
            end_date: budget.end_date,
        })
    }
}

fn budget_changes(previous: Option<&Budget>, current: &Budget) -> ChangeSet {
    let mut changes = ChangeSet::new();
    changes.track("Campaign", previous.map(|b| &b.campaign_id), &current.campaign_id);
    changes.track("Credit", previous.map(|b| &b.credit_id), &current.credit_id);
    changes.track("Start date", previous.map(|b| &b.start_date), &current.start_date);
    changes.track("End date", previous.map(|b| &b.end_date), &current.end_date);
    changes.track("Amount", previous.map(|b| &b.amount), &current.amount);
    changes.track("Margin", previous.map(|b| &b.margin), &current.margin);
    changes.track(
        "Freed amount",
        previous.map(|b| money::cc_to_decimal(b.freed_cc)).as_ref(),
        &money::cc_to_decimal(current.freed_cc),
    );
    changes.track_opt("Comment", previous.map(|b| &b.comment), &current.comment);
    changes
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        collaborators::{CampaignBudgetLimit, FxTable, LedgerPolicy, MemoryAuditSink},
        credit_service::{CreditPatch, NewCredit},
        fee_math,
        test_support::*,
    };
    use rust_decimal_macros::dec;

    #[test]
    fn state_follows_dates_without_spend() {
        let mut fx = Fixture::new();
        let credit = fx.signed_credit(1_000);
        let budget = fx.insert_budget(credit, date(2024, 1, 1), date(2024, 1, 31), 100);

        let state = |d| BudgetService::state(&fx.book, budget, d).unwrap();
        assert_eq!(state(date(2023, 12, 31)), BudgetState::Pending);
        assert_eq!(state(date(2024, 1, 15)), BudgetState::Active);
        assert_eq!(state(date(2024, 2, 1)), BudgetState::Inactive);
    }

    #[test]
    fn depletion_overrides_active_window() {
        let mut fx = Fixture::new();
        let credit = fx.signed_credit(1_000);
        let budget = fx.insert_budget(credit, date(2024, 1, 1), date(2024, 1, 31), 100);
        fx.record_spend(budget, date(2024, 1, 10), 100);

        assert_eq!(
            BudgetService::state(&fx.book, budget, date(2024, 1, 9)).unwrap(),
            BudgetState::Active
        );
        assert_eq!(
            BudgetService::state(&fx.book, budget, date(2024, 1, 15)).unwrap(),
            BudgetState::Depleted
        );
    }

    #[test]
    fn budgets_never_exceed_credit() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let credit = fx.signed_credit(1_000);

        let first = BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, credit, date(2024, 1, 1), date(2024, 3, 31), 600),
            ACTOR,
        )
        .unwrap();
        let err = BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, credit, date(2024, 4, 1), date(2024, 4, 30), 500),
            ACTOR,
        )
        .unwrap_err();
        assert_eq!(
            err.failures().unwrap().errors(),
            &[ValidationError::BudgetAmountExceededCreditAmount { overflow: dec!(100) }]
        );

        let err = BudgetService::update(&mut fx.book, &ctx, first, BudgetPatch::amount(1_100), ACTOR)
            .unwrap_err();
        assert!(err.failures().unwrap().any(|e| matches!(
            e,
            ValidationError::BudgetAmountExceededCreditAmount { .. }
        )));
        assert_eq!(fx.book.budget(first).unwrap().amount, 600);
        assert!(CreditService::get_allocated_amount(&fx.book, credit) <= dec!(1000));
    }

    #[test]
    fn refunded_money_can_be_allocated() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let credit = fx.signed_credit(1_000);
        fx.book
            .add_refund(bcm_domain::Refund::new(fx.account_id, credit, date(2024, 1, 1), 100));

        BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, credit, date(2024, 1, 1), date(2024, 3, 31), 1_100),
            ACTOR,
        )
        .unwrap();
    }

    #[test]
    fn overlapping_budgets_share_margin_under_bcm_v2() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let credit = fx.signed_credit(10_000);
        BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, credit, date(2024, 1, 1), date(2024, 1, 31), 100)
                .with_margin(dec!(0.1)),
            ACTOR,
        )
        .unwrap();

        let err = BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, credit, date(2024, 1, 15), date(2024, 2, 15), 100)
                .with_margin(dec!(0.2)),
            ACTOR,
        )
        .unwrap_err();
        assert_eq!(
            err.failures().unwrap().errors(),
            &[ValidationError::OverlappingBudgetMarginInvalid]
        );

        BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, credit, date(2024, 3, 1), date(2024, 3, 31), 100)
                .with_margin(dec!(0.2)),
            ACTOR,
        )
        .unwrap();
    }

    #[test]
    fn overlapping_budgets_share_license_fee_under_bcm_v2() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let plain = fx.signed_credit(1_000);
        let with_fee = fx.signed_credit_with(1_000, |credit| credit.license_fee = dec!(0.15));
        fx.insert_budget(plain, date(2024, 1, 1), date(2024, 1, 31), 100);

        let err = BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, with_fee, date(2024, 1, 20), date(2024, 2, 10), 100),
            ACTOR,
        )
        .unwrap_err();
        assert_eq!(
            err.failures().unwrap().errors(),
            &[ValidationError::OverlappingBudgets]
        );

        fx.set_bcm_v2(false);
        BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, with_fee, date(2024, 1, 20), date(2024, 2, 10), 100),
            ACTOR,
        )
        .unwrap();
    }

    #[test]
    fn create_checks_credit_and_dates() {
        let mut fx = Fixture::new();
        let ctx = fx.context_on(date(2024, 2, 1));
        let pending = fx.pending_credit(1_000);
        let euro = fx.signed_credit_with(1_000, |credit| credit.currency = CurrencyCode::new("EUR"));

        let err = BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, pending, date(2024, 1, 20), date(2025, 1, 31), 100),
            ACTOR,
        )
        .unwrap_err();
        let failures = err.failures().unwrap();
        assert!(failures.any(|e| *e == ValidationError::StartDateInThePast));
        assert!(failures.any(|e| *e == ValidationError::CreditPending));
        assert!(failures.any(|e| matches!(e, ValidationError::EndDateAfterCredit { .. })));

        let err = BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, euro, date(2024, 3, 1), date(2024, 3, 31), 100),
            ACTOR,
        )
        .unwrap_err();
        assert!(err.failures().unwrap().any(|e| matches!(
            e,
            ValidationError::CurrencyInconsistent { .. }
        )));

        let canceled = fx.signed_credit(1_000);
        CreditService::cancel(&mut fx.book, &ctx, canceled, ACTOR).unwrap();
        let err = BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, canceled, date(2024, 3, 1), date(2024, 3, 31), 100),
            ACTOR,
        )
        .unwrap_err();
        assert_eq!(
            err.failures().unwrap().errors(),
            &[ValidationError::CreditCanceled]
        );
    }

    #[test]
    fn credit_must_cover_campaign_account() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let stranger = fx.book.add_account(
            bcm_domain::Account::new("Elsewhere", CurrencyCode::usd()),
        );
        let foreign = CreditService::create(
            &mut fx.book,
            &ctx,
            NewCredit::for_account(
                stranger,
                date(2024, 1, 1),
                date(2024, 12, 31),
                1_000,
                CurrencyCode::usd(),
            ),
            ACTOR,
        )
        .unwrap();
        CreditService::update(&mut fx.book, &ctx, foreign, CreditPatch::sign(), ACTOR).unwrap();

        let err = BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, foreign, date(2024, 1, 1), date(2024, 1, 31), 100),
            ACTOR,
        )
        .unwrap_err();
        assert_eq!(
            err.failures().unwrap().errors(),
            &[ValidationError::CreditNotCoveringCampaign]
        );

        let agency_credit = fx.signed_agency_credit(1_000);
        BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, agency_credit, date(2024, 1, 1), date(2024, 1, 31), 100),
            ACTOR,
        )
        .unwrap();
    }

    #[test]
    fn margin_and_credit_are_fixed_after_creation() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let credit = fx.signed_credit(1_000);
        let other = fx.signed_credit(1_000);
        let budget = fx.insert_budget(credit, date(2024, 2, 1), date(2024, 2, 29), 100);

        let patch = BudgetPatch {
            margin: Some(dec!(0.3)),
            credit_id: Some(other),
            ..BudgetPatch::default()
        };
        let err = BudgetService::update(&mut fx.book, &ctx, budget, patch, ACTOR).unwrap_err();
        let failures = err.failures().unwrap();
        assert!(failures.any(|e| *e == ValidationError::CanNotChangeMargin));
        assert!(failures.any(|e| *e == ValidationError::CanNotChangeCredit));
    }

    #[test]
    fn running_budget_keeps_start_date_and_finished_budget_is_frozen() {
        let mut fx = Fixture::new();
        let credit = fx.signed_credit(1_000);
        let budget = fx.insert_budget(credit, date(2024, 1, 1), date(2024, 1, 31), 100);

        let active = fx.context_on(date(2024, 1, 15));
        let patch = BudgetPatch {
            start_date: Some(date(2024, 1, 10)),
            ..BudgetPatch::default()
        };
        let err = BudgetService::update(&mut fx.book, &active, budget, patch, ACTOR).unwrap_err();
        assert_eq!(
            err.failures().unwrap().errors(),
            &[ValidationError::CanNotChangeStartDate]
        );

        let extend = BudgetPatch {
            end_date: Some(date(2024, 2, 29)),
            ..BudgetPatch::default()
        };
        BudgetService::update(&mut fx.book, &active, budget, extend, ACTOR).unwrap();

        let finished = fx.context_on(date(2024, 3, 10));
        let patch = BudgetPatch {
            end_date: Some(date(2024, 3, 31)),
            ..BudgetPatch::default()
        };
        let err = BudgetService::update(&mut fx.book, &finished, budget, patch, ACTOR).unwrap_err();
        assert_eq!(
            err.failures().unwrap().errors(),
            &[ValidationError::BudgetNotEditable {
                state: BudgetState::Inactive
            }]
        );
    }

    #[test]
    fn lowering_needs_campaign_stop_or_allow_list() {
        let mut fx = Fixture::new();
        let credit = fx.signed_credit(1_000);
        let budget = fx.insert_budget(credit, date(2024, 1, 1), date(2024, 1, 31), 100);
        let today = date(2024, 1, 15);

        let ctx = fx.context_on(today);
        let err = BudgetService::update(&mut fx.book, &ctx, budget, BudgetPatch::amount(90), ACTOR)
            .unwrap_err();
        assert_eq!(
            err.failures().unwrap().errors(),
            &[ValidationError::CampaignStopDisabled]
        );

        let policy = LedgerPolicy {
            lowering_allow_list: vec![fx.account_id],
            ..LedgerPolicy::default()
        };
        let allowed = fx.context_on(today).with_policy(policy);
        BudgetService::update(&mut fx.book, &allowed, budget, BudgetPatch::amount(90), ACTOR)
            .unwrap();
        assert_eq!(fx.book.budget(budget).unwrap().amount, 90);
    }

    #[test]
    fn campaign_stop_reports_minimum_amount() {
        let mut fx = Fixture::new();
        let credit = fx.signed_credit(1_000);
        fx.set_real_time_campaign_stop(true);
        let budget = fx.insert_budget(credit, date(2024, 1, 1), date(2024, 1, 31), 100);
        let ctx = fx
            .context_on(date(2024, 1, 15))
            .with_campaign_stop(MinimumAmount(dec!(80)));

        let err = BudgetService::update(&mut fx.book, &ctx, budget, BudgetPatch::amount(50), ACTOR)
            .unwrap_err();
        assert_eq!(
            err.failures().unwrap().errors(),
            &[ValidationError::BudgetAmountTooLow { min_amount: dec!(80) }]
        );
        BudgetService::update(&mut fx.book, &ctx, budget, BudgetPatch::amount(85), ACTOR).unwrap();
    }

    #[test]
    fn pending_budget_can_be_lowered_freely() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let credit = fx.signed_credit(1_000);
        let budget = fx.insert_budget(credit, date(2024, 2, 1), date(2024, 2, 29), 100);

        BudgetService::update(&mut fx.book, &ctx, budget, BudgetPatch::amount(10), ACTOR).unwrap();
        assert_eq!(fx.book.budget(budget).unwrap().amount, 10);
    }

    #[test]
    fn canceled_credit_freezes_budget_amounts() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let credit = fx.signed_credit(1_000);
        let budget = fx.insert_budget(credit, date(2024, 2, 1), date(2024, 2, 29), 100);
        CreditService::cancel(&mut fx.book, &ctx, credit, ACTOR).unwrap();

        let err = BudgetService::update(&mut fx.book, &ctx, budget, BudgetPatch::amount(120), ACTOR)
            .unwrap_err();
        assert!(err
            .failures()
            .unwrap()
            .any(|e| *e == ValidationError::CanNotChangeBudgetAmount));
    }

    #[test]
    fn entity_limit_blocks_creation() {
        let mut fx = Fixture::new();
        let ctx = fx
            .context()
            .with_entity_limits(CampaignBudgetLimit { max_active: 1 });
        let credit = fx.signed_credit(1_000);
        fx.insert_budget(credit, date(2024, 2, 1), date(2024, 2, 29), 100);

        let err = BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, credit, date(2024, 3, 1), date(2024, 3, 31), 100),
            ACTOR,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::EntityLimitExceeded(_)));
    }

    #[test]
    fn validation_failures_come_before_the_entity_limit() {
        let mut fx = Fixture::new();
        let ctx = fx
            .context()
            .with_entity_limits(CampaignBudgetLimit { max_active: 1 });
        let credit = fx.signed_credit(1_000);
        fx.insert_budget(credit, date(2024, 2, 1), date(2024, 2, 29), 100);

        let err = BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, credit, date(2024, 3, 31), date(2024, 3, 1), 100),
            ACTOR,
        )
        .unwrap_err();
        assert!(err
            .failures()
            .unwrap()
            .any(|e| *e == ValidationError::EndDateBeforeStartDate));
        assert_eq!(fx.book.budgets.len(), 1);
    }

    #[test]
    fn create_audits_and_survives_failed_notification() {
        let mut fx = Fixture::new();
        let audit = Arc::new(MemoryAuditSink::new());
        let ctx = fx
            .context()
            .with_audit(audit.clone())
            .with_notifications(FailingNotifications);
        let credit = fx.signed_credit(1_000);

        let budget = BudgetService::create(
            &mut fx.book,
            &ctx,
            NewBudget::new(fx.campaign_id, credit, date(2024, 1, 1), date(2024, 1, 31), 100)
                .with_comment("launch"),
            ACTOR,
        )
        .unwrap();
        assert!(fx.book.budget(budget).is_some());
        assert_eq!(audit.records().len(), 1);
        assert_eq!(audit.records()[0].entity, EntityKind::Budget);
    }

    #[test]
    fn failed_update_leaves_book_and_audit_untouched() {
        let mut fx = Fixture::new();
        let (ctx, audit, _) = fx.recording_context();
        let credit = fx.signed_credit(1_000);
        let budget = fx.insert_budget(credit, date(2024, 2, 1), date(2024, 2, 29), 100);
        let before = fx.book.clone();

        let patch = BudgetPatch {
            end_date: Some(date(2025, 6, 30)),
            amount: Some(5_000),
            ..BudgetPatch::default()
        };
        let err = BudgetService::update(&mut fx.book, &ctx, budget, patch, ACTOR).unwrap_err();
        assert_eq!(err.failures().unwrap().len(), 2);
        assert_eq!(fx.book, before);
        assert!(audit.records().is_empty());
    }

    #[test]
    fn freeing_holds_reserve_until_settlement() {
        let mut fx = Fixture::new();
        let credit = fx.signed_credit(1_000);
        let budget = fx.insert_budget(credit, date(2024, 1, 1), date(2024, 1, 31), 100);
        fx.record_spend(budget, date(2024, 1, 29), 10);
        fx.record_spend(budget, date(2024, 1, 30), 20);
        fx.record_spend(budget, date(2024, 1, 31), 30);

        let early = fx.context_on(date(2024, 2, 2));
        let freed = BudgetService::free_inactive_allocated_assets(&mut fx.book, &early, budget, ACTOR)
            .unwrap();
        // 100 - 60 spent - 20 * 1.5 reserve
        assert_eq!(freed, 100_000);

        let again = BudgetService::free_inactive_allocated_assets(&mut fx.book, &early, budget, ACTOR)
            .unwrap();
        assert_eq!(again, 100_000);

        let settled = fx.context_on(date(2024, 2, 4));
        let freed = BudgetService::free_inactive_allocated_assets(&mut fx.book, &settled, budget, ACTOR)
            .unwrap();
        assert_eq!(freed, 400_000);
        assert_eq!(fx.book.budget(budget).unwrap().allocated_amount(), dec!(60));
        assert_eq!(
            BudgetService::state(&fx.book, budget, date(2024, 2, 4)).unwrap(),
            BudgetState::Depleted
        );
    }

    #[test]
    fn freeing_without_two_statements_is_a_no_op() {
        let mut fx = Fixture::new();
        let credit = fx.signed_credit(1_000);
        let budget = fx.insert_budget(credit, date(2024, 1, 1), date(2024, 1, 31), 100);
        fx.record_spend(budget, date(2024, 1, 31), 30);

        let ctx = fx.context_on(date(2024, 3, 1));
        assert_eq!(
            BudgetService::free_inactive_allocated_assets(&mut fx.book, &ctx, budget, ACTOR).unwrap(),
            0
        );
    }

    #[test]
    fn freeing_requires_inactive_budget() {
        let mut fx = Fixture::new();
        let credit = fx.signed_credit(1_000);
        let budget = fx.insert_budget(credit, date(2024, 1, 1), date(2024, 1, 31), 100);
        let ctx = fx.context_on(date(2024, 1, 15));
        assert!(matches!(
            BudgetService::free_inactive_allocated_assets(&mut fx.book, &ctx, budget, ACTOR),
            Err(CoreError::InvalidOperation(_))
        ));
    }

    #[test]
    fn settle_inactive_frees_every_finished_budget() {
        let mut fx = Fixture::new();
        let credit = fx.signed_credit(1_000);
        let january = fx.insert_budget(credit, date(2024, 1, 1), date(2024, 1, 31), 100);
        let february = fx.insert_budget(credit, date(2024, 2, 1), date(2024, 2, 29), 100);
        let running = fx.insert_budget(credit, date(2024, 3, 1), date(2024, 4, 30), 100);
        for budget in [january, february, running] {
            fx.record_spend(budget, date(2024, 1, 1), 0);
            fx.record_spend(budget, date(2024, 1, 2), 0);
        }

        let ctx = fx.context_on(date(2024, 3, 15));
        let settled = BudgetService::settle_inactive(&mut fx.book, &ctx, ACTOR);
        assert_eq!(settled, vec![(january, 1_000_000), (february, 1_000_000)]);
        assert_eq!(fx.book.budget(running).unwrap().freed_cc, 0);
    }

    #[test]
    fn available_amount_converts_currency() {
        let mut fx = Fixture::new();
        let credit = fx.signed_credit(1_000);
        let budget = fx.insert_budget(credit, date(2024, 1, 1), date(2024, 1, 31), 100);
        fx.record_statement(
            bcm_domain::DailyStatement::new(budget, date(2024, 1, 5))
                .with_spend(10_000_000_000, 0, 2_000_000_000, 3_000_000_000),
        );
        let mut rates = FxTable::new(CurrencyCode::usd(), 0);
        rates.add_rate(CurrencyCode::new("EUR"), date(2024, 1, 10), dec!(0.9));
        let ctx = fx.context().with_exchange_rates(rates);

        let day = date(2024, 1, 10);
        assert_eq!(
            BudgetService::get_available_amount(&fx.book, budget, day).unwrap(),
            dec!(88)
        );
        assert_eq!(
            BudgetService::get_available_etfm_amount(&fx.book, budget, day).unwrap(),
            dec!(85)
        );
        assert_eq!(
            BudgetService::get_available_amount_in(
                &fx.book,
                &ctx,
                budget,
                day,
                &CurrencyCode::new("EUR")
            )
            .unwrap(),
            dec!(79.2)
        );
        assert!(BudgetService::get_available_amount_in(
            &fx.book,
            &ctx,
            budget,
            date(2024, 1, 11),
            &CurrencyCode::new("EUR")
        )
        .is_err());
    }

    #[test]
    fn fee_context_comes_from_running_budget() {
        let mut fx = Fixture::new();
        let credit = fx.signed_credit_with(1_000, |credit| credit.license_fee = dec!(0.2));
        let budget = fx.insert_budget(credit, date(2024, 1, 1), date(2024, 1, 31), 100);
        fx.book.budget_mut(budget).unwrap().margin = dec!(0.1);

        let context = BudgetService::fee_context_on(&fx.book, fx.campaign_id, date(2024, 1, 10))
            .expect("budget runs");
        assert_eq!(context, FeeContext::new(dec!(0.2), dec!(0.1)));
        assert_eq!(
            fee_math::calculate_min_daily_budget(dec!(10), Some(&context)),
            dec!(14)
        );
        assert!(BudgetService::fee_context_on(&fx.book, fx.campaign_id, date(2024, 2, 1)).is_none());
    }

    #[test]
    fn ideal_spend_and_delete() {
        let mut fx = Fixture::new();
        let ctx = fx.context();
        let credit = fx.signed_credit(1_000);
        let budget = fx.insert_budget(credit, date(2024, 2, 1), date(2024, 2, 29), 290);

        assert_eq!(
            BudgetService::get_ideal_budget_spend(&fx.book, budget, date(2024, 1, 31)).unwrap(),
            Decimal::ZERO
        );
        assert_eq!(
            BudgetService::get_ideal_budget_spend(&fx.book, budget, date(2024, 2, 29)).unwrap(),
            dec!(290)
        );
        assert_eq!(
            BudgetService::get_ideal_budget_spend(&fx.book, budget, date(2024, 2, 10)).unwrap(),
            dec!(100)
        );

        let running = fx.insert_budget(credit, date(2024, 1, 1), date(2024, 1, 31), 100);
        let later = fx.context_on(date(2024, 1, 2));
        assert!(matches!(
            BudgetService::delete(&mut fx.book, &later, running, ACTOR),
            Err(CoreError::InvalidOperation(_))
        ));
        BudgetService::delete(&mut fx.book, &ctx, budget, ACTOR).unwrap();
        assert!(fx.book.budget(budget).is_none());
    }
}
