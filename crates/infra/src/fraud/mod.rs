//! Fraud analysis jobs: submission, status lookup and the worker-side handler.

mod handler;
mod queue;

pub use handler::{analysis_handler, register_analysis_handler};
pub use queue::{AnalysisStatus, FraudQueue};

use serde::{Deserialize, Serialize};

use fraudwatch_core::Transaction;

/// Job kind of a fraud analysis.
pub const ANALYZE_TRANSACTION: &str = "fraud.analyze_transaction";

/// Job payload: the transaction and the history captured at submit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub transaction: Transaction,
    pub history: Vec<Transaction>,
}
