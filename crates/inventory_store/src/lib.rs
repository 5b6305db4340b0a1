//! Inventory storage for the back office.
//!
//! This crate provides the persistence abstraction for the catalog, users and
//! audit log, together with the stock ledger rules every store applies
//! atomically. It ships an in-memory store (tests and single-process use) and
//! a SQLite store.

mod error;
pub mod ledger;
mod memory;
mod sqlite;
mod traits;

pub use error::*;
pub use ledger::{LedgerReceipt, StockAdjustment, StockViolation, TransactionAmendment, ViolationKind};
pub use memory::*;
pub use sqlite::*;
pub use traits::*;
