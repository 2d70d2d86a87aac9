//! bcm-config
//!
//! Ledger policy settings and where books live on disk.
//! Owns the Config data structure plus disk persistence helpers.

pub mod error;
pub mod manager;
pub mod model;

pub use error::ConfigError;
pub use manager::ConfigManager;
pub use model::{Config, LedgerSettings};
