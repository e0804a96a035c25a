use fraudwatch_core::{Transaction, Verdict};

use crate::error::AiError;

/// Something that can judge a transaction against the user's recent history.
///
/// Calls are synchronous and potentially slow (minutes); run them on worker
/// threads, never on a request-handling task.
pub trait FraudClassifier: Send + Sync + 'static {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Classify `transaction` given the `history` snapshot taken at submission.
    ///
    /// The history never contains `transaction` itself.
    fn classify(&self, transaction: &Transaction, history: &[Transaction]) -> Result<Verdict, AiError>;
}
