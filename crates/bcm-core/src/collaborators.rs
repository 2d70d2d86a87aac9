//! Boundary contracts the ledger consumes, and the context that bundles them.
//!
//! Every collaborator is injected; nothing here is a global.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use bcm_domain::{Budget, Campaign, CurrencyCode};

use crate::{
    audit::{AuditRecord, EntityKind},
    error::{CoreError, CoreResult},
    time::{Clock, SystemClock},
};

/// Looks up how many units of `currency` one unit of the base currency buys.
pub trait ExchangeRateProvider: Send + Sync {
    fn exchange_rate(&self, date: NaiveDate, currency: &CurrencyCode) -> CoreResult<Decimal>;
}

/// Converts `amount` between two currencies through the base currency.
pub fn convert_amount(
    rates: &dyn ExchangeRateProvider,
    amount: Decimal,
    from: &CurrencyCode,
    to: &CurrencyCode,
    date: NaiveDate,
) -> CoreResult<Decimal> {
    if from == to {
        return Ok(amount);
    }
    let from_rate = rates.exchange_rate(date, from)?;
    if from_rate.is_zero() {
        return Err(CoreError::ExchangeRate(format!("zero rate for {from} on {date}")));
    }
    let to_rate = rates.exchange_rate(date, to)?;
    Ok(amount / from_rate * to_rate)
}

/// In-memory daily rates against a base currency. A missing day falls back
/// to the nearest earlier rate within the tolerance.
#[derive(Debug, Clone)]
pub struct FxTable {
    base: CurrencyCode,
    rates: HashMap<CurrencyCode, BTreeMap<NaiveDate, Decimal>>,
    tolerance_days: i64,
}

impl FxTable {
    pub fn new(base: CurrencyCode, tolerance_days: i64) -> Self {
        Self {
            base,
            rates: HashMap::new(),
            tolerance_days,
        }
    }

    pub fn add_rate(&mut self, currency: CurrencyCode, date: NaiveDate, rate: Decimal) {
        self.rates.entry(currency).or_default().insert(date, rate);
    }

    pub fn base(&self) -> &CurrencyCode {
        &self.base
    }
}

impl ExchangeRateProvider for FxTable {
    fn exchange_rate(&self, date: NaiveDate, currency: &CurrencyCode) -> CoreResult<Decimal> {
        if currency == &self.base {
            return Ok(Decimal::ONE);
        }
        let series = self.rates.get(currency).ok_or_else(|| {
            CoreError::ExchangeRate(format!("no rates for {} against {}", currency, self.base))
        })?;
        if let Some(rate) = series.get(&date) {
            return Ok(*rate);
        }
        if let Some((near_date, rate)) = series.range(..=date).next_back() {
            if (date - *near_date).num_days() <= self.tolerance_days {
                return Ok(*rate);
            }
        }
        Err(CoreError::ExchangeRate(format!(
            "{} rate missing on {} (no prior rate within {} days)",
            currency, date, self.tolerance_days
        )))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Budget amount has to be at least {min_amount}.")]
pub struct MinAmountError {
    pub min_amount: Decimal,
}

/// Vetoes lowering a running budget below what the campaign already needs.
pub trait CampaignStopValidator: Send + Sync {
    fn validate_minimum_budget_amount(
        &self,
        budget: &Budget,
        proposed_amount: i64,
    ) -> Result<(), MinAmountError>;
}

/// Accepts every amount; used when no campaign-stop subsystem is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCampaignStop;

impl CampaignStopValidator for NoCampaignStop {
    fn validate_minimum_budget_amount(&self, _: &Budget, _: i64) -> Result<(), MinAmountError> {
        Ok(())
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord) -> CoreResult<()>;
}

impl<T: AuditSink + ?Sized> AuditSink for Arc<T> {
    fn record(&self, record: AuditRecord) -> CoreResult<()> {
        (**self).record(record)
    }
}

/// Writes audit records to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: AuditRecord) -> CoreResult<()> {
        tracing::info!(
            entity = %record.entity,
            id = %record.entity_id,
            action = %record.action,
            actor = %record.actor,
            "{}",
            record.summary()
        );
        Ok(())
    }
}

/// Keeps audit records in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: AuditRecord) -> CoreResult<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| CoreError::Collaborator("audit log lock poisoned".into()))?;
        records.push(record);
        Ok(())
    }
}

/// Announces a new credit or budget.
#[derive(Debug, Clone, PartialEq)]
pub struct CreationEvent {
    pub entity: EntityKind,
    pub id: Uuid,
    pub owner_name: String,
    pub amount: i64,
    pub currency_symbol: String,
    pub end_date: NaiveDate,
}

/// Fire-and-forget; the ledger logs and drops any error it returns.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: &CreationEvent) -> CoreResult<()>;
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn notify(&self, event: &CreationEvent) -> CoreResult<()> {
        (**self).notify(event)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, event: &CreationEvent) -> CoreResult<()> {
        tracing::info!(
            entity = %event.entity,
            id = %event.id,
            "New {} for {}: {}{} until {}",
            event.entity,
            event.owner_name,
            event.currency_symbol,
            event.amount,
            event.end_date
        );
        Ok(())
    }
}

/// Caps how many live budgets a campaign may hold.
pub trait EntityLimitEnforcer: Send + Sync {
    fn check_budget_limit(&self, campaign: &Campaign, active_budgets: usize) -> CoreResult<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct CampaignBudgetLimit {
    pub max_active: usize,
}

impl EntityLimitEnforcer for CampaignBudgetLimit {
    fn check_budget_limit(&self, campaign: &Campaign, active_budgets: usize) -> CoreResult<()> {
        if active_budgets >= self.max_active {
            return Err(CoreError::EntityLimitExceeded(format!(
                "campaign `{}` already has {} active budgets (limit {})",
                campaign.name, active_budgets, self.max_active
            )));
        }
        Ok(())
    }
}

/// Tunables of the accounting rules.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerPolicy {
    /// Multiple of the last settled day's spend held back when freeing.
    pub reserve_factor: Decimal,
    pub reserve_factor_offset: Decimal,
    /// Days after a budget ends before its spend counts as final.
    pub report_settlement_days: i64,
    /// Accounts allowed to lower budgets without campaign stop.
    pub lowering_allow_list: Vec<Uuid>,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            reserve_factor: Decimal::new(15, 1),
            reserve_factor_offset: Decimal::ZERO,
            report_settlement_days: 3,
            lowering_allow_list: Vec::new(),
        }
    }
}

pub const DEFAULT_MAX_ACTIVE_BUDGETS: usize = 100;
pub const DEFAULT_FX_TOLERANCE_DAYS: i64 = 5;

/// Policy plus every injected collaborator a service call may need.
pub struct LedgerContext {
    pub policy: LedgerPolicy,
    pub clock: Box<dyn Clock>,
    pub exchange_rates: Box<dyn ExchangeRateProvider>,
    pub campaign_stop: Box<dyn CampaignStopValidator>,
    pub audit: Box<dyn AuditSink>,
    pub notifications: Box<dyn NotificationSink>,
    pub entity_limits: Box<dyn EntityLimitEnforcer>,
}

impl LedgerContext {
    pub fn new(policy: LedgerPolicy) -> Self {
        Self {
            policy,
            clock: Box::new(SystemClock),
            exchange_rates: Box::new(FxTable::new(CurrencyCode::usd(), DEFAULT_FX_TOLERANCE_DAYS)),
            campaign_stop: Box::new(NoCampaignStop),
            audit: Box::new(TracingAuditSink),
            notifications: Box::new(TracingNotificationSink),
            entity_limits: Box::new(CampaignBudgetLimit {
                max_active: DEFAULT_MAX_ACTIVE_BUDGETS,
            }),
        }
    }

    pub fn with_policy(mut self, policy: LedgerPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_exchange_rates(mut self, rates: impl ExchangeRateProvider + 'static) -> Self {
        self.exchange_rates = Box::new(rates);
        self
    }

    pub fn with_campaign_stop(mut self, validator: impl CampaignStopValidator + 'static) -> Self {
        self.campaign_stop = Box::new(validator);
        self
    }

    pub fn with_audit(mut self, sink: impl AuditSink + 'static) -> Self {
        self.audit = Box::new(sink);
        self
    }

    pub fn with_notifications(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.notifications = Box::new(sink);
        self
    }

    pub fn with_entity_limits(mut self, limits: impl EntityLimitEnforcer + 'static) -> Self {
        self.entity_limits = Box::new(limits);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Sends a creation event; failures are logged and swallowed.
    pub(crate) fn announce(&self, event: CreationEvent) {
        if let Err(err) = self.notifications.notify(&event) {
            tracing::warn!(entity = %event.entity, id = %event.id, "notification failed: {err}");
        }
    }
}

impl Default for LedgerContext {
    fn default() -> Self {
        Self::new(LedgerPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn fx_table_uses_nearest_prior_rate_within_tolerance() {
        let mut table = FxTable::new(CurrencyCode::usd(), 2);
        table.add_rate(CurrencyCode::new("EUR"), date(10), dec!(0.9));

        assert_eq!(table.exchange_rate(date(12), &CurrencyCode::new("EUR")).unwrap(), dec!(0.9));
        assert!(table.exchange_rate(date(13), &CurrencyCode::new("EUR")).is_err());
        assert!(table.exchange_rate(date(9), &CurrencyCode::new("EUR")).is_err());
        assert_eq!(table.exchange_rate(date(1), &CurrencyCode::usd()).unwrap(), Decimal::ONE);
    }

    #[test]
    fn conversion_goes_through_base_currency() {
        let mut table = FxTable::new(CurrencyCode::usd(), 0);
        table.add_rate(CurrencyCode::new("EUR"), date(1), dec!(0.8));
        table.add_rate(CurrencyCode::new("GBP"), date(1), dec!(0.5));

        let eur = CurrencyCode::new("EUR");
        let gbp = CurrencyCode::new("GBP");
        let usd = CurrencyCode::usd();
        assert_eq!(convert_amount(&table, dec!(80), &eur, &usd, date(1)).unwrap(), dec!(100));
        assert_eq!(convert_amount(&table, dec!(80), &eur, &gbp, date(1)).unwrap(), dec!(50));
        assert_eq!(convert_amount(&table, dec!(80), &eur, &eur, date(2)).unwrap(), dec!(80));
    }

    #[test]
    fn campaign_budget_limit_rejects_at_cap() {
        let limit = CampaignBudgetLimit { max_active: 2 };
        let campaign = Campaign::new("Spring", Uuid::new_v4());
        assert!(limit.check_budget_limit(&campaign, 1).is_ok());
        assert!(matches!(
            limit.check_budget_limit(&campaign, 2),
            Err(CoreError::EntityLimitExceeded(_))
        ));
    }
}
