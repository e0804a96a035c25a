use std::sync::Arc;

use tracing::info;

use fraudwatch_ai::FraudClassifier;

use crate::jobs::{Job, JobExecutor, JobResult, JobStore};

use super::{ANALYZE_TRANSACTION, AnalysisPayload};

/// Job handler running one analysis attempt through `classifier`.
///
/// Transport and upstream errors are retried; an undecodable payload or
/// input the classifier rejects fails the job at once.
pub fn analysis_handler(classifier: Arc<dyn FraudClassifier>) -> impl Fn(&Job) -> JobResult + Send + Sync + 'static {
    move |job: &Job| {
        let payload: AnalysisPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(payload) => payload,
            Err(e) => return JobResult::Fatal(format!("undecodable analysis payload: {e}")),
        };

        match classifier.classify(&payload.transaction, &payload.history) {
            Ok(verdict) => {
                info!(
                    job_id = %job.id,
                    attempt = job.attempt,
                    user_id = %payload.transaction.user_id,
                    is_fraud = verdict.is_fraud,
                    risk_score = verdict.risk_score,
                    "analysis complete"
                );
                match serde_json::to_value(&verdict) {
                    Ok(value) => JobResult::Success(value),
                    Err(e) => JobResult::Fatal(format!("verdict serialization failed: {e}")),
                }
            }
            Err(e) if e.is_retryable() => JobResult::Failure(e.to_string()),
            Err(e) => JobResult::Fatal(e.to_string()),
        }
    }
}

/// Register [`analysis_handler`] under [`ANALYZE_TRANSACTION`].
pub fn register_analysis_handler<S>(executor: &mut JobExecutor<S>, classifier: Arc<dyn FraudClassifier>)
where
    S: JobStore + 'static,
{
    executor.register_handler(ANALYZE_TRANSACTION, analysis_handler(classifier));
}
