use std::io::{self, Write};

use colored::{ColoredString, Colorize};
use rust_decimal::Decimal;

use bcm_domain::{symbol_for, BudgetState, CreditStatus};

/// Message categories used by the CLI output helpers.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Success,
    Warning,
    Section,
}

pub fn line(out: &mut dyn Write, kind: MessageKind, message: impl AsRef<str>) -> io::Result<()> {
    let text = message.as_ref();
    let styled = match kind {
        MessageKind::Info => text.normal(),
        MessageKind::Success => format!("[ok] {text}").green(),
        MessageKind::Warning => format!("[!] {text}").yellow(),
        MessageKind::Section => format!("=== {} ===", text.trim()).bold(),
    };
    writeln!(out, "{styled}")
}

pub fn disable_colors() {
    colored::control::set_override(false);
}

/// `1234.5` in `USD` renders as `$1234.50`.
pub fn money(value: Decimal, currency: &str) -> String {
    let symbol = symbol_for(currency);
    if value.is_sign_negative() && !value.is_zero() {
        format!("-{symbol}{:.2}", value.abs())
    } else {
        format!("{symbol}{:.2}", value)
    }
}

pub fn budget_state(state: BudgetState) -> ColoredString {
    let label = state.to_string().to_uppercase();
    match state {
        BudgetState::Pending => label.cyan(),
        BudgetState::Active => label.green(),
        BudgetState::Inactive => label.dimmed(),
        BudgetState::Depleted => label.red(),
    }
}

pub fn credit_status(status: CreditStatus) -> ColoredString {
    let label = status.to_string().to_uppercase();
    match status {
        CreditStatus::Pending => label.cyan(),
        CreditStatus::Signed => label.green(),
        CreditStatus::Canceled => label.red(),
    }
}
