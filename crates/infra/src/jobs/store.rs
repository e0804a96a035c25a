//! Job storage abstraction and the in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;

use super::types::{Job, JobId, JobStatus};

/// Job store abstraction (queue + result backend).
pub trait JobStore: Send + Sync {
    /// Enqueue a new job.
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError>;

    /// Get a job by ID. Unknown (or expired) jobs are `None`.
    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// Persist a job after a state transition.
    fn update(&self, job: &Job) -> Result<(), JobStoreError>;

    /// Claim the next job that is ready to execute and mark it running.
    ///
    /// A job is handed to at most one caller per attempt.
    fn claim_next(&self) -> Result<Option<Job>, JobStoreError>;

    /// Re-queue jobs that have been running for longer than `lease`.
    ///
    /// Returns how many jobs were put back.
    fn requeue_stale(&self, lease: Duration) -> Result<usize, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("storage error: {0}")]
    Storage(String),
}

impl<S> JobStore for Arc<S>
where
    S: JobStore + ?Sized,
{
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        (**self).enqueue(job)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        (**self).get(job_id)
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        (**self).update(job)
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        (**self).claim_next()
    }

    fn requeue_stale(&self, lease: Duration) -> Result<usize, JobStoreError> {
        (**self).requeue_stale(lease)
    }
}

/// In-memory job store for tests/dev (single process).
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> JobStoreError {
    JobStoreError::Storage("job store lock poisoned".to_string())
}

impl JobStore for InMemoryJobStore {
    fn enqueue(&self, job: Job) -> Result<JobId, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        let id = job.id;
        jobs.insert(id, job);
        Ok(id)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let jobs = self.jobs.read().map_err(poisoned)?;
        Ok(jobs.get(&job_id).cloned())
    }

    fn update(&self, job: &Job) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        match jobs.get_mut(&job.id) {
            Some(slot) => {
                *slot = job.clone();
                Ok(())
            }
            None => Err(JobStoreError::NotFound(job.id)),
        }
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;

        // Oldest ready job first (FIFO).
        let next = jobs
            .values()
            .filter(|j| {
                matches!(j.status, JobStatus::Pending | JobStatus::Retrying { .. }) && j.is_ready()
            })
            .min_by_key(|j| (j.created_at, j.id.0))
            .map(|j| j.id);

        Ok(next.and_then(|id| {
            jobs.get_mut(&id).map(|job| {
                job.mark_running();
                job.clone()
            })
        }))
    }

    fn requeue_stale(&self, lease: Duration) -> Result<usize, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(poisoned)?;
        let cutoff = Utc::now() - chrono::Duration::from_std(lease).unwrap_or_default();

        let mut requeued = 0;
        for job in jobs.values_mut() {
            if job.status == JobStatus::Running && job.updated_at < cutoff {
                job.mark_requeued();
                requeued += 1;
            }
        }
        Ok(requeued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::JobState;

    #[test]
    fn enqueue_and_claim() {
        let store = InMemoryJobStore::new();

        let job = Job::new("test", serde_json::json!({}));
        let job_id = store.enqueue(job).unwrap();

        let claimed = store.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id, job_id);
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(claimed.attempt, 1);

        // Claimed once; nothing else is ready.
        assert!(store.claim_next().unwrap().is_none());
        assert_eq!(store.get(job_id).unwrap().unwrap().status.state(), JobState::Running);
    }

    #[test]
    fn claims_in_submission_order() {
        let store = InMemoryJobStore::new();
        let first = store.enqueue(Job::new("test", serde_json::json!({"n": 1}))).unwrap();
        let second = store.enqueue(Job::new("test", serde_json::json!({"n": 2}))).unwrap();

        assert_eq!(store.claim_next().unwrap().unwrap().id, first);
        assert_eq!(store.claim_next().unwrap().unwrap().id, second);
    }

    #[test]
    fn duplicate_enqueue_is_rejected() {
        let store = InMemoryJobStore::new();
        let job = Job::new("test", serde_json::json!({}));

        store.enqueue(job.clone()).unwrap();
        assert!(matches!(store.enqueue(job), Err(JobStoreError::AlreadyExists(_))));
    }

    #[test]
    fn unknown_job_is_none() {
        let store = InMemoryJobStore::new();
        assert!(store.get(JobId::new()).unwrap().is_none());
    }

    #[test]
    fn retrying_job_waits_for_its_schedule() {
        let store = InMemoryJobStore::new();
        store.enqueue(Job::new("test", serde_json::json!({}))).unwrap();

        let mut claimed = store.claim_next().unwrap().unwrap();
        claimed.mark_failed("boom".to_string(), Utc::now());
        store.update(&claimed).unwrap();

        // Default policy delays the retry by 5s.
        assert!(store.claim_next().unwrap().is_none());

        claimed.scheduled_at = None;
        store.update(&claimed).unwrap();
        let again = store.claim_next().unwrap().unwrap();
        assert_eq!(again.attempt, 2);
    }

    #[test]
    fn stale_running_jobs_are_requeued() {
        let store = InMemoryJobStore::new();
        store.enqueue(Job::new("test", serde_json::json!({}))).unwrap();

        let mut claimed = store.claim_next().unwrap().unwrap();
        claimed.updated_at = Utc::now() - chrono::Duration::minutes(10);
        store.update(&claimed).unwrap();

        assert_eq!(store.requeue_stale(Duration::from_secs(60)).unwrap(), 1);
        let reclaimed = store.claim_next().unwrap().unwrap();
        assert_eq!(reclaimed.id, claimed.id);
        assert_eq!(reclaimed.attempt, 2);
    }
}
