use std::sync::Arc;

use tracing::{debug, warn};

use fraudwatch_core::{HistoryWindow, Transaction, Verdict};

use crate::jobs::{Job, JobId, JobState, JobStatus, JobStore, JobStoreError, RetryPolicy};

use super::{ANALYZE_TRANSACTION, AnalysisPayload};

/// What a poller sees for one analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisStatus {
    pub state: JobState,
    /// Present once the job succeeded.
    pub verdict: Option<Verdict>,
    /// Terminal error text of a failed job.
    pub error: Option<String>,
    /// Attempts started so far.
    pub attempts: u32,
}

impl AnalysisStatus {
    fn waiting() -> Self {
        Self {
            state: JobState::Waiting,
            verdict: None,
            error: None,
            attempts: 0,
        }
    }

    fn from_job(job: &Job) -> Self {
        let mut status = Self {
            state: job.status.state(),
            verdict: None,
            error: None,
            attempts: job.attempt,
        };

        match &job.status {
            JobStatus::Succeeded => {
                match job.output.as_ref().map(|v| serde_json::from_value::<Verdict>(v.clone())) {
                    Some(Ok(verdict)) => status.verdict = Some(verdict),
                    Some(Err(e)) => {
                        warn!(job_id = %job.id, error = %e, "stored verdict is unreadable");
                        status.state = JobState::Failed;
                        status.error = Some(format!("stored verdict is unreadable: {e}"));
                    }
                    None => {
                        status.state = JobState::Failed;
                        status.error = Some("job succeeded without a verdict".to_string());
                    }
                }
            }
            JobStatus::Failed { error, .. } => status.error = Some(error.clone()),
            JobStatus::Pending | JobStatus::Running | JobStatus::Retrying { .. } => {}
        }

        status
    }
}

/// Submission and polling of fraud analysis jobs.
#[derive(Clone)]
pub struct FraudQueue {
    store: Arc<dyn JobStore>,
    retry_policy: RetryPolicy,
}

impl FraudQueue {
    pub fn new(store: Arc<dyn JobStore>, retry_policy: RetryPolicy) -> Self {
        Self { store, retry_policy }
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    /// Enqueue an analysis of `transaction` against `history`.
    ///
    /// The history is snapshotted into the payload, so later appends do not
    /// change what the worker sees.
    pub fn submit(&self, transaction: &Transaction, history: &HistoryWindow) -> Result<JobId, JobStoreError> {
        let payload = AnalysisPayload {
            transaction: transaction.clone(),
            history: history.as_slice().to_vec(),
        };
        let payload = serde_json::to_value(&payload)
            .map_err(|e| JobStoreError::Storage(format!("payload serialization failed: {e}")))?;

        let job = Job::new(ANALYZE_TRANSACTION, payload).with_retry_policy(self.retry_policy.clone());
        let id = self.store.enqueue(job)?;

        debug!(job_id = %id, user_id = %transaction.user_id, history_len = history.len(), "analysis submitted");
        Ok(id)
    }

    /// Status of a job by its textual id.
    ///
    /// Ids that are malformed, never issued or already expired all read as
    /// `waiting`.
    pub fn get_status(&self, task_id: &str) -> Result<AnalysisStatus, JobStoreError> {
        let Ok(job_id) = task_id.parse::<JobId>() else {
            return Ok(AnalysisStatus::waiting());
        };

        Ok(self
            .store
            .get(job_id)?
            .map(|job| AnalysisStatus::from_job(&job))
            .unwrap_or_else(AnalysisStatus::waiting))
    }
}
