//! bcm-storage-json
//!
//! Keeps ledger books as pretty-printed JSON files, one per book, with a
//! rolling set of timestamped backups beside them.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use bcm_core::{
    storage::{BookBackupInfo, BookStorage},
    CoreError,
};
use bcm_domain::LedgerBook;
use chrono::{NaiveDateTime, Utc};
use tracing::{debug, warn};

const BOOK_EXTENSION: &str = "json";
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S";
pub const DEFAULT_RETENTION: usize = 5;

/// Where books and their backups live.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    pub books_root: PathBuf,
    pub backups_root: PathBuf,
}

impl StoragePaths {
    pub fn under(root: &Path) -> Self {
        Self {
            books_root: root.join("books"),
            backups_root: root.join("backups"),
        }
    }
}

/// Filesystem-backed [`BookStorage`].
#[derive(Debug, Clone)]
pub struct JsonBookStorage {
    paths: StoragePaths,
    retention: usize,
}

impl JsonBookStorage {
    pub fn new(paths: StoragePaths) -> Result<Self, CoreError> {
        Self::with_retention(paths, DEFAULT_RETENTION)
    }

    /// Keeps at most `retention` backups per book; zero is raised to one.
    pub fn with_retention(paths: StoragePaths, retention: usize) -> Result<Self, CoreError> {
        fs::create_dir_all(&paths.books_root)?;
        fs::create_dir_all(&paths.backups_root)?;
        Ok(Self {
            paths,
            retention: retention.max(1),
        })
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn book_path(&self, name: &str) -> PathBuf {
        self.paths
            .books_root
            .join(format!("{}.{BOOK_EXTENSION}", book_slug(name)))
    }

    fn backup_dir(&self, name: &str) -> PathBuf {
        self.paths.backups_root.join(book_slug(name))
    }

    /// Copies the current file, if any, into the backup rotation.
    fn rotate_existing(&self, name: &str) -> Result<(), CoreError> {
        let current = self.book_path(name);
        if !current.exists() {
            return Ok(());
        }
        let target = self.next_backup_path(name, None)?;
        fs::copy(&current, &target)?;
        self.prune(name)
    }

    fn next_backup_path(&self, name: &str, note: Option<&str>) -> Result<PathBuf, CoreError> {
        let dir = self.backup_dir(name);
        fs::create_dir_all(&dir)?;
        let mut stem = format!("{}-{}", book_slug(name), Utc::now().format(STAMP_FORMAT));
        if let Some(label) = note.and_then(note_slug) {
            stem.push('-');
            stem.push_str(&label);
        }
        let mut candidate = dir.join(format!("{stem}.{BOOK_EXTENSION}"));
        let mut counter = 1;
        while candidate.exists() {
            candidate = dir.join(format!("{stem}~{counter}.{BOOK_EXTENSION}"));
            counter += 1;
        }
        Ok(candidate)
    }

    fn prune(&self, name: &str) -> Result<(), CoreError> {
        for stale in self.list_backups(name)?.into_iter().skip(self.retention) {
            if let Err(err) = fs::remove_file(&stale.path) {
                warn!(backup = %stale.id, error = %err, "failed to prune backup");
            }
        }
        Ok(())
    }
}

impl BookStorage for JsonBookStorage {
    fn save_book(&self, name: &str, book: &LedgerBook) -> Result<(), CoreError> {
        self.rotate_existing(name)?;
        write_book(&self.book_path(name), book)?;
        debug!(book = %name, "book saved");
        Ok(())
    }

    fn load_book(&self, name: &str) -> Result<LedgerBook, CoreError> {
        let path = self.book_path(name);
        if !path.exists() {
            return Err(CoreError::BookNotFound(name.to_string()));
        }
        read_book(&path)
    }

    fn list_books(&self) -> Result<Vec<String>, CoreError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.paths.books_root)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(BOOK_EXTENSION)
            {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete_book(&self, name: &str) -> Result<(), CoreError> {
        match fs::remove_file(self.book_path(name)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn save_book_to_path(&self, book: &LedgerBook, path: &Path) -> Result<(), CoreError> {
        write_book(path, book)
    }

    fn load_book_from_path(&self, path: &Path) -> Result<LedgerBook, CoreError> {
        read_book(path)
    }

    fn backup_book(
        &self,
        name: &str,
        book: &LedgerBook,
        note: Option<&str>,
    ) -> Result<BookBackupInfo, CoreError> {
        let path = self.next_backup_path(name, note)?;
        write_book(&path, book)?;
        let info = backup_info(name, path);
        self.prune(name)?;
        Ok(info)
    }

    /// Newest first.
    fn list_backups(&self, name: &str) -> Result<Vec<BookBackupInfo>, CoreError> {
        let dir = self.backup_dir(name);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BOOK_EXTENSION) {
                continue;
            }
            found.push(backup_info(name, path));
        }
        found.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(found)
    }

    fn restore_backup(&self, backup: &BookBackupInfo) -> Result<LedgerBook, CoreError> {
        if !backup.path.exists() {
            return Err(CoreError::Storage(format!(
                "backup `{}` not found",
                backup.id
            )));
        }
        let book = read_book(&backup.path)?;
        self.rotate_existing(&backup.book)?;
        write_book(&self.book_path(&backup.book), &book)?;
        Ok(book)
    }
}

fn backup_info(name: &str, path: PathBuf) -> BookBackupInfo {
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let created_at = backup_time(name, &id)
        .map(|taken| taken.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default();
    BookBackupInfo {
        book: book_slug(name),
        id,
        created_at,
        path,
    }
}

fn backup_time(name: &str, id: &str) -> Option<NaiveDateTime> {
    let rest = id.strip_prefix(&book_slug(name))?.strip_prefix('-')?;
    NaiveDateTime::parse_from_str(rest.get(..15)?, STAMP_FORMAT).ok()
}

/// File-safe book name: lowercase ascii, everything else becomes `_`.
pub fn book_slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if slug.trim_matches('_').is_empty() {
        "book".into()
    } else {
        slug
    }
}

fn note_slug(note: &str) -> Option<String> {
    let words: Vec<String> = note
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    (!words.is_empty()).then(|| words.join("-"))
}

fn read_book(path: &Path) -> Result<LedgerBook, CoreError> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str(&raw).map_err(|err| CoreError::Serde(err.to_string()))
}

/// Stages the JSON next to `path` and renames it into place.
fn write_book(path: &Path, book: &LedgerBook) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json =
        serde_json::to_string_pretty(book).map_err(|err| CoreError::Serde(err.to_string()))?;
    let staging = path.with_extension(format!("{BOOK_EXTENSION}.tmp"));
    let mut file = File::create(&staging)?;
    file.write_all(json.as_bytes())?;
    file.flush()?;
    fs::rename(&staging, path)?;
    Ok(())
}
