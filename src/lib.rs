#![doc(test(attr(deny(warnings))))]

//! BCM ledger: credits, the budgets drawn from them, spend statements and
//! refunds, with JSON persistence and a small operator CLI.
//!
//! The accounting rules live in `bcm-core`; this crate wires them to
//! configuration, storage and logging.

pub mod cli;
pub mod errors;
pub mod manager;
pub mod report;
pub mod settings;
pub mod utils;

pub use errors::{BcmError, Result};
pub use manager::{LedgerManager, OpenReport};
pub use report::BookSummary;

pub use bcm_config;
pub use bcm_core;
pub use bcm_domain;

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs tracing once and logs the build being run.
pub fn init() {
    INIT.call_once(|| {
        utils::init_tracing();
        tracing::debug!(build = %utils::build_info::BUILD_INFO.summary(), "bcm_ledger initialized");
    });
}
