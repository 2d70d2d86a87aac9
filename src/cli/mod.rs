//! `bcm_cli` command dispatch.
//!
//! ```text
//! bcm_cli books
//! bcm_cli summary <book> [--as-of YYYY-MM-DD] [--json]
//! bcm_cli settle <book> [--as-of YYYY-MM-DD] [--actor NAME]
//! bcm_cli backups <book>
//! bcm_cli version
//! ```

pub mod output;

use std::io::Write;

use bcm_config::{Config, ConfigManager};
use bcm_core::FixedClock;
use chrono::NaiveDate;

use crate::{
    errors::{BcmError, Result},
    manager::LedgerManager,
    report::BookSummary,
    settings,
    utils::build_info::BUILD_INFO,
};
use output::MessageKind;

const DEFAULT_ACTOR: &str = "bcm_cli";

pub const USAGE: &str = "usage: bcm_cli <books|summary|settle|backups|version> [book] [--as-of YYYY-MM-DD] [--actor NAME] [--json]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Books,
    Summary {
        book: String,
        as_of: Option<NaiveDate>,
        json: bool,
    },
    Settle {
        book: String,
        as_of: Option<NaiveDate>,
        actor: String,
    },
    Backups {
        book: String,
    },
    Version,
    Help,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((verb, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };
        let mut positional = Vec::new();
        let mut as_of = None;
        let mut actor = None;
        let mut json = false;
        let mut iter = rest.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--as-of" => {
                    let raw = iter.next().ok_or_else(|| missing_value("--as-of"))?;
                    as_of = Some(parse_date(raw)?);
                }
                "--actor" => {
                    actor = Some(iter.next().ok_or_else(|| missing_value("--actor"))?.clone());
                }
                "--json" => json = true,
                flag if flag.starts_with("--") => {
                    return Err(BcmError::InvalidArgument(format!("unknown flag `{flag}`")))
                }
                value => positional.push(value.to_string()),
            }
        }
        let book = || {
            positional
                .first()
                .cloned()
                .ok_or_else(|| BcmError::InvalidArgument(format!("`{verb}` needs a book name")))
        };
        match verb.as_str() {
            "books" => Ok(Command::Books),
            "summary" => Ok(Command::Summary {
                book: book()?,
                as_of,
                json,
            }),
            "settle" => Ok(Command::Settle {
                book: book()?,
                as_of,
                actor: actor.unwrap_or_else(|| DEFAULT_ACTOR.to_string()),
            }),
            "backups" => Ok(Command::Backups { book: book()? }),
            "version" | "--version" => Ok(Command::Version),
            "help" | "--help" | "-h" => Ok(Command::Help),
            other => Err(BcmError::InvalidArgument(format!("unknown command `{other}`"))),
        }
    }
}

fn missing_value(flag: &str) -> BcmError {
    BcmError::InvalidArgument(format!("`{flag}` needs a value"))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| BcmError::InvalidArgument(format!("`{raw}` is not a YYYY-MM-DD date")))
}

/// Loads the settings file from the default data directory, then runs `args`.
pub fn run_from_env(args: &[String], out: &mut dyn Write) -> Result<()> {
    let root = Config::default().resolve_data_dir();
    let config = ConfigManager::with_base_dir(&root)?.load()?;
    run(args, &config, out)
}

pub fn run(args: &[String], config: &Config, out: &mut dyn Write) -> Result<()> {
    if !config.ui_color_enabled {
        output::disable_colors();
    }
    let command = Command::parse(args)?;
    tracing::debug!(?command, "dispatching");
    let mut manager = LedgerManager::from_config(config)?;
    match command {
        Command::Books => {
            let books = manager.storage().list_books()?;
            if books.is_empty() {
                output::line(out, MessageKind::Info, "No books yet.")?;
            }
            for name in books {
                writeln!(out, "{name}")?;
            }
        }
        Command::Summary { book, as_of, json } => {
            manager.open(&book)?;
            let as_of = as_of.unwrap_or_else(|| manager.context().today());
            let summary = BookSummary::build(manager.book()?, as_of)?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
            } else {
                print_summary(out, &summary)?;
            }
        }
        Command::Settle { book, as_of, actor } => {
            if let Some(date) = as_of {
                manager.set_context(settings::ledger_context(config)?.with_clock(FixedClock(date)));
            }
            let report = manager.open(&book)?;
            for warning in &report.warnings {
                output::line(out, MessageKind::Warning, warning)?;
            }
            let settled = manager.settle(&actor)?;
            if settled.is_empty() {
                output::line(out, MessageKind::Info, "Nothing to free.")?;
                return Ok(());
            }
            manager.save()?;
            for (budget_id, freed_cc) in &settled {
                output::line(
                    out,
                    MessageKind::Success,
                    format!(
                        "Freed budget {budget_id}: {}",
                        bcm_domain::money::cc_to_decimal(*freed_cc).normalize()
                    ),
                )?;
            }
        }
        Command::Backups { book } => {
            let backups = manager.list_backups(&book)?;
            if backups.is_empty() {
                output::line(out, MessageKind::Info, format!("No backups for `{book}`."))?;
            }
            for backup in backups {
                writeln!(out, "{}  {}", backup.created_at, backup.id)?;
            }
        }
        Command::Version => writeln!(out, "{}", BUILD_INFO.summary())?,
        Command::Help => writeln!(out, "{USAGE}")?,
    }
    Ok(())
}

fn print_summary(out: &mut dyn Write, summary: &BookSummary) -> Result<()> {
    output::line(
        out,
        MessageKind::Section,
        format!("{} as of {}", summary.book, summary.as_of),
    )?;
    output::line(out, MessageKind::Section, "Credits")?;
    for credit in &summary.credits {
        writeln!(
            out,
            "{:<24} {:<9} {} .. {}  amount {}  allocated {}  available {}{}",
            credit.owner,
            output::credit_status(credit.status),
            credit.start_date,
            credit.end_date,
            output::money(credit.effective_amount, &credit.currency),
            output::money(credit.allocated, &credit.currency),
            output::money(credit.available, &credit.currency),
            if credit.open_for_budgets { "" } else { "  (closed)" },
        )?;
    }
    output::line(out, MessageKind::Section, "Budgets")?;
    for budget in &summary.budgets {
        writeln!(
            out,
            "{:<24} {:<9} {} .. {}  amount {}  spent {}  left {}",
            budget.campaign,
            output::budget_state(budget.state),
            budget.start_date,
            budget.end_date,
            output::money(budget.amount.into(), &budget.currency),
            output::money(budget.spent_etfm, &budget.currency),
            output::money(budget.available_etfm, &budget.currency),
        )?;
    }
    Ok(())
}
