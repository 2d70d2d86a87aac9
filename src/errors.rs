use bcm_config::ConfigError;
use bcm_core::CoreError;
use thiserror::Error;

/// Errors surfaced by the ledger facade and the CLI.
#[derive(Debug, Error)]
pub enum BcmError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("No ledger book is open")]
    NoBookOpen,
    #[error("Book schema v{found} is newer than supported v{supported}")]
    UnsupportedSchema { found: u8, supported: u8 },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, BcmError>;
