//! bcm-core
//!
//! Accounting rules for budget & credit management: fee math, overlap
//! queries, spend roll-ups and the credit, budget and refund services.
//! Depends on bcm-domain. No terminal I/O and no direct file access; every
//! outside dependency arrives through [`LedgerContext`].

pub mod audit;
pub mod budget_service;
pub mod collaborators;
pub mod credit_service;
pub mod error;
pub mod fee_math;
pub mod overlap;
pub mod refund_service;
pub mod spend_service;
pub mod storage;
pub mod time;

pub use audit::*;
pub use budget_service::*;
pub use collaborators::*;
pub use credit_service::*;
pub use error::*;
pub use fee_math::FeeContext;
pub use refund_service::*;
pub use spend_service::*;
pub use time::*;

#[cfg(test)]
mod test_support;
