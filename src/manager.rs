use std::path::Path;

use bcm_config::Config;
use bcm_core::{
    storage::{book_warnings, BookBackupInfo, BookStorage},
    BudgetService, CoreResult, LedgerContext,
};
use bcm_domain::{LedgerBook, CURRENT_SCHEMA_VERSION};
use bcm_storage_json::{JsonBookStorage, StoragePaths};
use uuid::Uuid;

use crate::{
    errors::{BcmError, Result},
    report::BookSummary,
    settings,
};

/// Result of opening a book.
#[derive(Debug, Clone)]
pub struct OpenReport {
    pub name: String,
    pub warnings: Vec<String>,
}

/// Facade over the open book, its storage and the service context.
pub struct LedgerManager {
    current: Option<LedgerBook>,
    current_name: Option<String>,
    storage: Box<dyn BookStorage>,
    context: LedgerContext,
}

impl LedgerManager {
    pub fn new(storage: Box<dyn BookStorage>, context: LedgerContext) -> Self {
        Self {
            current: None,
            current_name: None,
            storage,
            context,
        }
    }

    /// JSON storage under the configured data directory and a context
    /// built from the ledger settings.
    pub fn from_config(config: &Config) -> Result<Self> {
        let context = settings::ledger_context(config)?;
        let storage = JsonBookStorage::with_retention(
            StoragePaths::under(&config.resolve_data_dir()),
            config.backup_retention,
        )?;
        Ok(Self::new(Box::new(storage), context))
    }

    pub fn storage(&self) -> &dyn BookStorage {
        self.storage.as_ref()
    }

    pub fn context(&self) -> &LedgerContext {
        &self.context
    }

    pub fn set_context(&mut self, context: LedgerContext) {
        self.context = context;
    }

    pub fn book(&self) -> Result<&LedgerBook> {
        self.current.as_ref().ok_or(BcmError::NoBookOpen)
    }

    pub fn current_name(&self) -> Option<&str> {
        self.current_name.as_deref()
    }

    /// Starts an empty, unsaved book.
    pub fn create(&mut self, name: &str) -> &mut LedgerBook {
        self.current_name = Some(name.to_string());
        self.current.insert(LedgerBook::new(name))
    }

    /// Replaces the open book with `book`, known under `name`.
    pub fn adopt(&mut self, name: &str, book: LedgerBook) {
        self.current_name = Some(name.to_string());
        self.current = Some(book);
    }

    pub fn open(&mut self, name: &str) -> Result<OpenReport> {
        let book = self.storage.load_book(name)?;
        self.install(name, book)
    }

    pub fn open_path(&mut self, path: &Path) -> Result<OpenReport> {
        let book = self.storage.load_book_from_path(path)?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("book")
            .to_string();
        self.install(&name, book)
    }

    pub fn save(&mut self) -> Result<()> {
        let name = self
            .current_name
            .clone()
            .ok_or_else(|| BcmError::InvalidArgument("open book has no name".into()))?;
        self.save_as(&name)
    }

    pub fn save_as(&mut self, name: &str) -> Result<()> {
        let book = self.current.as_ref().ok_or(BcmError::NoBookOpen)?;
        self.storage.save_book(name, book)?;
        self.current_name = Some(name.to_string());
        tracing::info!(book = %name, "book saved");
        Ok(())
    }

    pub fn export_to(&self, path: &Path) -> Result<()> {
        self.storage.save_book_to_path(self.book()?, path)?;
        Ok(())
    }

    pub fn backup(&self, note: Option<&str>) -> Result<BookBackupInfo> {
        let name = self.current_name.as_deref().ok_or(BcmError::NoBookOpen)?;
        Ok(self.storage.backup_book(name, self.book()?, note)?)
    }

    pub fn list_backups(&self, name: &str) -> Result<Vec<BookBackupInfo>> {
        Ok(self.storage.list_backups(name)?)
    }

    pub fn restore_backup(&mut self, backup: &BookBackupInfo) -> Result<OpenReport> {
        let book = self.storage.restore_backup(backup)?;
        let name = backup.book.clone();
        self.install(&name, book)
    }

    /// Runs a service operation against the open book.
    ///
    /// ```ignore
    /// let id = manager.apply(|book, ctx| CreditService::create(book, ctx, new_credit, "ops"))?;
    /// ```
    pub fn apply<T>(
        &mut self,
        operation: impl FnOnce(&mut LedgerBook, &LedgerContext) -> CoreResult<T>,
    ) -> Result<T> {
        let book = self.current.as_mut().ok_or(BcmError::NoBookOpen)?;
        Ok(operation(book, &self.context)?)
    }

    /// Frees every inactive budget of the open book as of today.
    pub fn settle(&mut self, actor: &str) -> Result<Vec<(Uuid, i64)>> {
        let book = self.current.as_mut().ok_or(BcmError::NoBookOpen)?;
        let settled = BudgetService::settle_inactive(book, &self.context, actor);
        tracing::info!(budgets = settled.len(), "settlement finished");
        Ok(settled)
    }

    pub fn summary(&self) -> Result<BookSummary> {
        Ok(BookSummary::build(self.book()?, self.context.today())?)
    }

    fn install(&mut self, name: &str, book: LedgerBook) -> Result<OpenReport> {
        if book.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(BcmError::UnsupportedSchema {
                found: book.schema_version,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }
        let warnings = book_warnings(&book);
        for warning in &warnings {
            tracing::warn!(book = %name, "{warning}");
        }
        self.current = Some(book);
        self.current_name = Some(name.to_string());
        Ok(OpenReport {
            name: name.to_string(),
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn manager_in(root: &Path) -> LedgerManager {
        let storage = JsonBookStorage::new(StoragePaths::under(root)).unwrap();
        LedgerManager::new(Box::new(storage), LedgerContext::default())
    }

    #[test]
    fn operations_need_an_open_book() {
        let dir = tempdir().unwrap();
        let mut manager = manager_in(dir.path());

        assert!(matches!(manager.book(), Err(BcmError::NoBookOpen)));
        assert!(matches!(manager.save(), Err(BcmError::InvalidArgument(_))));
        assert!(matches!(manager.settle("ops"), Err(BcmError::NoBookOpen)));
    }

    #[test]
    fn create_save_and_reopen() {
        let dir = tempdir().unwrap();
        let mut manager = manager_in(dir.path());
        manager.create("Q2 Media");
        manager.save().unwrap();

        let mut other = manager_in(dir.path());
        let report = other.open("Q2 Media").unwrap();
        assert!(report.warnings.is_empty());
        assert_eq!(other.book().unwrap().name, "Q2 Media");
    }

    #[test]
    fn rejects_newer_schema() {
        let dir = tempdir().unwrap();
        let mut manager = manager_in(dir.path());
        let mut book = LedgerBook::new("Future");
        book.schema_version = CURRENT_SCHEMA_VERSION + 1;
        let path = dir.path().join("future.json");
        fs::write(&path, serde_json::to_string(&book).unwrap()).unwrap();

        match manager.open_path(&path) {
            Err(BcmError::UnsupportedSchema { found, .. }) => {
                assert_eq!(found, CURRENT_SCHEMA_VERSION + 1)
            }
            other => panic!("expected schema error, got {other:?}"),
        }
        assert!(manager.book().is_err());
    }
}
