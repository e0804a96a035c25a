//! `fraudwatch-core`: transaction domain primitives.
//!
//! This crate contains **pure domain** types (no IO, no HTTP, no storage):
//! the submitted transaction, the bounded per-user history window and the
//! verdict shape produced by inference.

pub mod error;
pub mod history;
pub mod id;
pub mod transaction;
pub mod verdict;

pub use error::{DomainError, DomainResult};
pub use history::{HISTORY_LIMIT, HistoryWindow};
pub use id::{TransactionRef, UserId};
pub use transaction::{REQUIRED_FIELDS, Transaction};
pub use verdict::Verdict;
