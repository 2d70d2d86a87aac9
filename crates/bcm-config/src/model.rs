use std::{env, path::PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ConfigError;

/// Overrides every other data directory setting when present.
pub const HOME_ENV: &str = "BCM_LEDGER_HOME";

/// Persistent configuration of a ledger installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default = "Config::default_ui_color_enabled")]
    pub ui_color_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_opened_book: Option<String>,
    #[serde(default = "Config::default_backup_retention")]
    pub backup_retention: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    /// Optional custom root for books and backups.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger: LedgerSettings::default(),
            ui_color_enabled: Self::default_ui_color_enabled(),
            last_opened_book: None,
            backup_retention: Self::default_backup_retention(),
            data_dir: None,
        }
    }
}

impl Config {
    pub fn default_ui_color_enabled() -> bool {
        true
    }

    pub fn default_backup_retention() -> usize {
        5
    }

    /// `BCM_LEDGER_HOME`, then `data_dir`, then the platform data directory.
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(home) = env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
            return PathBuf::from(home);
        }
        if let Some(path) = &self.data_dir {
            return path.clone();
        }
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bcm-ledger")
    }

    pub fn books_dir(&self) -> PathBuf {
        self.resolve_data_dir().join("books")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.resolve_data_dir().join("backups")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ledger.validate()?;
        if self.backup_retention == 0 {
            return Err(ConfigError::Invalid {
                field: "backup_retention",
                reason: "keep at least one backup".into(),
            });
        }
        Ok(())
    }
}

/// Tunables of the accounting rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerSettings {
    #[serde(default = "LedgerSettings::default_reserve_factor")]
    pub reserve_factor: Decimal,
    #[serde(default)]
    pub reserve_factor_offset: Decimal,
    #[serde(default = "LedgerSettings::default_report_settlement_days")]
    pub report_settlement_days: i64,
    #[serde(default = "LedgerSettings::default_max_active_budgets")]
    pub max_active_budgets_per_campaign: usize,
    /// Accounts that may lower running budgets without campaign stop.
    #[serde(default)]
    pub lowering_allow_list: Vec<Uuid>,
    #[serde(default = "LedgerSettings::default_base_currency")]
    pub base_currency: String,
    #[serde(default = "LedgerSettings::default_fx_tolerance_days")]
    pub fx_tolerance_days: i64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            reserve_factor: Self::default_reserve_factor(),
            reserve_factor_offset: Decimal::ZERO,
            report_settlement_days: Self::default_report_settlement_days(),
            max_active_budgets_per_campaign: Self::default_max_active_budgets(),
            lowering_allow_list: Vec::new(),
            base_currency: Self::default_base_currency(),
            fx_tolerance_days: Self::default_fx_tolerance_days(),
        }
    }
}

impl LedgerSettings {
    pub fn default_reserve_factor() -> Decimal {
        Decimal::new(15, 1)
    }

    pub fn default_report_settlement_days() -> i64 {
        3
    }

    pub fn default_max_active_budgets() -> usize {
        100
    }

    pub fn default_base_currency() -> String {
        "USD".into()
    }

    pub fn default_fx_tolerance_days() -> i64 {
        5
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reserve_factor + self.reserve_factor_offset < Decimal::ZERO {
            return Err(ConfigError::Invalid {
                field: "reserve_factor",
                reason: "reserve factor plus offset cannot be negative".into(),
            });
        }
        if self.report_settlement_days < 0 {
            return Err(ConfigError::Invalid {
                field: "report_settlement_days",
                reason: "cannot be negative".into(),
            });
        }
        if self.fx_tolerance_days < 0 {
            return Err(ConfigError::Invalid {
                field: "fx_tolerance_days",
                reason: "cannot be negative".into(),
            });
        }
        let code = self.base_currency.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::Invalid {
                field: "base_currency",
                reason: format!("`{}` is not an ISO 4217 code", self.base_currency),
            });
        }
        Ok(())
    }
}
