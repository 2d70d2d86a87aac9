use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use bcm_domain::{CreditOwner, LedgerBook};

use crate::CoreError;

/// Describes a persisted backup of a ledger book.
#[derive(Debug, Clone)]
pub struct BookBackupInfo {
    pub book: String,
    pub id: String,
    pub created_at: String,
    pub path: PathBuf,
}

/// Abstraction over persistence backends capable of storing books and backups.
pub trait BookStorage: Send + Sync {
    fn save_book(&self, name: &str, book: &LedgerBook) -> Result<(), CoreError>;
    fn load_book(&self, name: &str) -> Result<LedgerBook, CoreError>;
    fn list_books(&self) -> Result<Vec<String>, CoreError>;
    fn delete_book(&self, name: &str) -> Result<(), CoreError>;
    fn save_book_to_path(&self, book: &LedgerBook, path: &Path) -> Result<(), CoreError>;
    fn load_book_from_path(&self, path: &Path) -> Result<LedgerBook, CoreError>;
    fn backup_book(
        &self,
        name: &str,
        book: &LedgerBook,
        note: Option<&str>,
    ) -> Result<BookBackupInfo, CoreError>;
    fn list_backups(&self, name: &str) -> Result<Vec<BookBackupInfo>, CoreError>;
    fn restore_backup(&self, backup: &BookBackupInfo) -> Result<LedgerBook, CoreError>;
}

/// Detects dangling references within a book snapshot.
pub fn book_warnings(book: &LedgerBook) -> Vec<String> {
    let accounts: HashSet<_> = book.accounts.iter().map(|a| a.id).collect();
    let agencies: HashSet<_> = book.agencies.iter().map(|a| a.id).collect();
    let campaigns: HashSet<_> = book.campaigns.iter().map(|c| c.id).collect();
    let credits: HashSet<_> = book.credits.iter().map(|c| c.id).collect();
    let budgets: HashSet<_> = book.budgets.iter().map(|b| b.id).collect();
    let mut warnings = Vec::new();

    for campaign in &book.campaigns {
        if !accounts.contains(&campaign.account_id) {
            warnings.push(format!(
                "campaign {} references unknown account {}",
                campaign.id, campaign.account_id
            ));
        }
    }
    for credit in &book.credits {
        let known = match credit.owner {
            CreditOwner::Account(id) => accounts.contains(&id),
            CreditOwner::Agency(id) => agencies.contains(&id),
        };
        if !known {
            warnings.push(format!("credit {} references unknown {}", credit.id, credit.owner));
        }
    }
    for budget in &book.budgets {
        if !credits.contains(&budget.credit_id) {
            warnings.push(format!(
                "budget {} references missing credit {}",
                budget.id, budget.credit_id
            ));
        }
        if !campaigns.contains(&budget.campaign_id) {
            warnings.push(format!(
                "budget {} references missing campaign {}",
                budget.id, budget.campaign_id
            ));
        }
    }
    for refund in &book.refunds {
        if !credits.contains(&refund.credit_id) {
            warnings.push(format!(
                "refund {} references missing credit {}",
                refund.id, refund.credit_id
            ));
        }
    }
    let orphaned = book
        .statements
        .iter()
        .filter(|row| !budgets.contains(&row.budget_id))
        .count();
    if orphaned > 0 {
        warnings.push(format!("{orphaned} statements reference missing budgets"));
    }
    warnings
}
