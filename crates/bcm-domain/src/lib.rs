//! bcm-domain
//!
//! Pure domain models for budget & credit management (Credit, Budget,
//! DailyStatement, Refund and their owners). No I/O, no storage.
//! Only data types, unit conversions and the derived values that depend
//! on nothing but an entity's own fields.

pub mod account;
pub mod book;
pub mod budget;
pub mod common;
pub mod credit;
pub mod money;
pub mod refund;
pub mod statement;

pub use account::*;
pub use book::*;
pub use budget::*;
pub use common::*;
pub use credit::*;
pub use refund::*;
pub use statement::*;
