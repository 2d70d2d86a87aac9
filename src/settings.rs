//! Turns persisted [`Config`] into the policy and collaborators the
//! services run with.

use std::{collections::BTreeMap, fs, io, path::Path};

use bcm_config::{Config, LedgerSettings};
use bcm_core::{CampaignBudgetLimit, FxTable, LedgerContext, LedgerPolicy};
use bcm_domain::CurrencyCode;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::errors::Result;

/// File under the data directory holding exchange rates.
pub const RATES_FILE: &str = "rates.json";

/// Per-currency daily rates against the base currency, as stored on disk.
pub type RateSheet = BTreeMap<String, BTreeMap<NaiveDate, Decimal>>;

pub fn ledger_policy(settings: &LedgerSettings) -> LedgerPolicy {
    LedgerPolicy {
        reserve_factor: settings.reserve_factor,
        reserve_factor_offset: settings.reserve_factor_offset,
        report_settlement_days: settings.report_settlement_days,
        lowering_allow_list: settings.lowering_allow_list.clone(),
    }
}

pub fn fx_table(settings: &LedgerSettings, sheet: &RateSheet) -> FxTable {
    let mut table = FxTable::new(
        CurrencyCode::new(settings.base_currency.as_str()),
        settings.fx_tolerance_days,
    );
    for (code, rates) in sheet {
        for (date, rate) in rates {
            table.add_rate(CurrencyCode::new(code.as_str()), *date, *rate);
        }
    }
    table
}

/// Missing file means no rates beyond the base currency.
pub fn load_rate_sheet(path: &Path) -> Result<RateSheet> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(RateSheet::new()),
        Err(err) => Err(err.into()),
    }
}

/// Context for `config`, reading rates from the configured data directory.
pub fn ledger_context(config: &Config) -> Result<LedgerContext> {
    config.validate()?;
    let sheet = load_rate_sheet(&config.resolve_data_dir().join(RATES_FILE))?;
    Ok(context_with_rates(&config.ledger, &sheet))
}

pub fn context_with_rates(settings: &LedgerSettings, sheet: &RateSheet) -> LedgerContext {
    LedgerContext::new(ledger_policy(settings))
        .with_exchange_rates(fx_table(settings, sheet))
        .with_entity_limits(CampaignBudgetLimit {
            max_active: settings.max_active_budgets_per_campaign,
        })
}
