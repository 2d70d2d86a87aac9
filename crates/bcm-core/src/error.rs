use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use bcm_domain::{BudgetState, CurrencyCode};

/// One violated ledger invariant. Validators return every failure they find
/// so a caller can fix all of them in a single round trip.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Start date has to be greater or equal to today.")]
    StartDateInThePast,
    #[error("End date has to be greater or equal to today.")]
    EndDateInThePast,
    #[error("Start date cannot be before the credit start date ({credit_start}).")]
    StartDateBeforeCredit { credit_start: NaiveDate },
    #[error("End date cannot be after the credit end date ({credit_end}).")]
    EndDateAfterCredit { credit_end: NaiveDate },
    #[error("End date has to be greater or equal to the start date.")]
    EndDateBeforeStartDate,
    #[error("Only pending budgets can change start date.")]
    CanNotChangeStartDate,
    #[error("Budget is {state} and can no longer be changed.")]
    BudgetNotEditable { state: BudgetState },
    #[error("Margin cannot be changed once the budget exists.")]
    CanNotChangeMargin,
    #[error("Credit cannot be changed once the budget exists.")]
    CanNotChangeCredit,
    #[error("Budget cannot be created against a canceled credit.")]
    CreditCanceled,
    #[error("Credit has to be signed before budgets can use it.")]
    CreditPending,
    #[error("Credit currency {credit} does not match the account currency {account}.")]
    CurrencyInconsistent {
        credit: CurrencyCode,
        account: CurrencyCode,
    },
    #[error("Credit does not cover the campaign's account.")]
    CreditNotCoveringCampaign,
    #[error("Margin must be between 0% and 100%.")]
    MarginRangeInvalid,
    #[error("Margin must match the margin of overlapping budgets.")]
    OverlappingBudgetMarginInvalid,
    #[error("License fee must match the license fee of overlapping budgets.")]
    OverlappingBudgets,
    #[error("Budget amount has to be positive.")]
    BudgetAmountNegative,
    #[error("Budget amount cannot change because the credit is canceled.")]
    CanNotChangeBudgetAmount,
    #[error("Budget amount has to be at least {min_amount}.")]
    BudgetAmountTooLow { min_amount: Decimal },
    #[error("Budget amount cannot be lowered without real-time campaign stop.")]
    CampaignStopDisabled,
    #[error("Budget exceeds the credit's available amount by {overflow}.")]
    BudgetAmountExceededCreditAmount { overflow: Decimal },

    #[error("Credit has to belong to exactly one account or agency.")]
    CreditOwnerInvalid,
    #[error("Start date and license fee can only change while the credit is pending.")]
    CreditNotEditable,
    #[error("End date cannot move before {previous}.")]
    EndDateInvalid { previous: NaiveDate },
    #[error("License fee must be between 0% and 100%.")]
    LicenseFeeInvalid,
    #[error("Flat fee exceeds the credit's unallocated amount ({available}).")]
    FlatFeeExceedsAvailableAmount { available: Decimal },
    #[error("Credit amount cannot be negative.")]
    CreditAmountNegative,
    #[error("Credit amount cannot drop below the allocated {allocated}.")]
    CreditAmountTooLow { allocated: Decimal },
    #[error("Credit status cannot return to pending.")]
    CreditStatusInvalid,
    #[error("End date cannot be before the latest budget end date ({latest_budget_end}).")]
    CreditEndDateBeforeBudgets { latest_budget_end: NaiveDate },

    #[error("Refund has to start on the first day of a month.")]
    StartDateInvalid,
    #[error("Refund month has to fall within the credit ({credit_start} – {credit_end}).")]
    RefundOutsideCredit {
        credit_start: NaiveDate,
        credit_end: NaiveDate,
    },
    #[error("Refund amount cannot be negative.")]
    RefundAmountNegative,
    #[error("Refund amount exceeds the credit's total spend ({total_spend}).")]
    RefundAmountExceededTotalSpend { total_spend: Decimal },
    #[error("Refund would leave the credit with a negative available amount ({available}).")]
    CreditAvailableAmountNegative { available: Decimal },
}

/// Aggregated validation failures for a single operation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationFailures(pub Vec<ValidationError>);

impl ValidationFailures {
    /// Turns the collected failures into a result; an empty list passes.
    pub fn check(failures: Vec<ValidationError>) -> Result<(), CoreError> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(ValidationFailures(failures)))
        }
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn any(&self, predicate: impl Fn(&ValidationError) -> bool) -> bool {
        self.0.iter().any(predicate)
    }
}

impl fmt::Display for ValidationFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join(" "))
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(ValidationFailures),
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),
    #[error("Agency not found: {0}")]
    AgencyNotFound(Uuid),
    #[error("Campaign not found: {0}")]
    CampaignNotFound(Uuid),
    #[error("Credit not found: {0}")]
    CreditNotFound(Uuid),
    #[error("Budget not found: {0}")]
    BudgetNotFound(Uuid),
    #[error("Refund not found: {0}")]
    RefundNotFound(Uuid),
    #[error("Entity limit exceeded: {0}")]
    EntityLimitExceeded(String),
    #[error("Exchange rate unavailable: {0}")]
    ExchangeRate(String),
    #[error("Collaborator failed: {0}")]
    Collaborator(String),
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    #[error("Ledger book not found: {0}")]
    BookNotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Validation failures carried by this error, if any.
    pub fn failures(&self) -> Option<&ValidationFailures> {
        match self {
            CoreError::Validation(failures) => Some(failures),
            _ => None,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
