use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{NaiveDateTime, Utc};

use crate::{Config, ConfigError};

const CONFIG_FILE: &str = "settings.json";
const SNAPSHOT_PREFIX: &str = "settings";
const SNAPSHOT_STAMP: &str = "%Y%m%dT%H%M%S";

/// Reads, writes and snapshots the ledger [`Config`] file.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    backups_dir: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: PathBuf, backups_dir: PathBuf) -> Self {
        Self {
            config_path,
            backups_dir,
        }
    }

    /// Lays out `<root>/settings.json` and `<root>/settings.d/`.
    pub fn with_base_dir(root: &Path) -> Result<Self, ConfigError> {
        let backups_dir = root.join("settings.d");
        fs::create_dir_all(&backups_dir)?;
        Ok(Self::new(root.join(CONFIG_FILE), backups_dir))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Missing file yields defaults; a present file must parse and validate.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let config = match fs::read_to_string(&self.config_path) {
            Ok(raw) => parse(&raw)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Config::default(),
            Err(err) => return Err(err.into()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        config.validate()?;
        replace_file(&self.config_path, &render(config)?)
    }

    /// Writes a timestamped copy of `config`; returns the snapshot file name.
    pub fn backup(&self, config: &Config, label: Option<&str>) -> Result<String, ConfigError> {
        let stamp = Utc::now().format(SNAPSHOT_STAMP);
        let name = match label.and_then(slug) {
            Some(label) => format!("{SNAPSHOT_PREFIX}-{stamp}-{label}.json"),
            None => format!("{SNAPSHOT_PREFIX}-{stamp}.json"),
        };
        replace_file(&self.backups_dir.join(&name), &render(config)?)?;
        Ok(name)
    }

    /// Loads a snapshot. The live file is left untouched until `save`.
    pub fn restore(&self, name: &str) -> Result<Config, ConfigError> {
        let path = self.backups_dir.join(name);
        let raw = fs::read_to_string(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => io::Error::new(
                io::ErrorKind::NotFound,
                format!("settings snapshot `{name}` not found"),
            ),
            _ => err,
        })?;
        let config = parse(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Snapshot names, newest first.
    pub fn list_backups(&self) -> Result<Vec<String>, ConfigError> {
        let entries = match fs::read_dir(&self.backups_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut found = Vec::new();
        for entry in entries {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some(taken) = snapshot_time(&name) {
                found.push((taken, name));
            }
        }
        found.sort_by(|a, b| b.cmp(a));
        Ok(found.into_iter().map(|(_, name)| name).collect())
    }
}

fn parse(raw: &str) -> Result<Config, ConfigError> {
    serde_json::from_str(raw).map_err(|err| ConfigError::Serde(err.to_string()))
}

fn render(config: &Config) -> Result<String, ConfigError> {
    serde_json::to_string_pretty(config).map_err(|err| ConfigError::Serde(err.to_string()))
}

/// Lowercase ascii words joined by `-`.
fn slug(label: &str) -> Option<String> {
    let words: Vec<String> = label
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    (!words.is_empty()).then(|| words.join("-"))
}

fn snapshot_time(name: &str) -> Option<NaiveDateTime> {
    let rest = name
        .strip_prefix(SNAPSHOT_PREFIX)?
        .strip_prefix('-')?
        .strip_suffix(".json")?;
    let stamp = rest.get(..15)?;
    NaiveDateTime::parse_from_str(stamp, SNAPSHOT_STAMP).ok()
}

/// Writes next to `path` then renames over it.
fn replace_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staging = path.with_extension("json.partial");
    let mut file = File::create(&staging)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    fs::rename(&staging, path)?;
    Ok(())
}
