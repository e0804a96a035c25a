//! Background job system: queue, result backend and worker pool.
//!
//! ## Design
//!
//! - Jobs are typed by a string `kind` and carry a JSON payload
//! - Bounded retries with a fixed delay between attempts
//! - No dead-letter queue: a job that exhausts its attempts stays `failed`
//!   and keeps its error until the result expires
//! - Running jobs hold a lease; jobs of a vanished worker are re-queued
//!   (at-least-once execution)
//!
//! ## Components
//!
//! - `Job`: payload, status and per-attempt history
//! - `JobStore`: queue + result backend (in-memory or Redis)
//! - `JobExecutor`: worker threads that claim, run and settle jobs

pub mod executor;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod store;
pub mod types;

pub use executor::{ExecutorStats, JobExecutor, JobExecutorConfig, JobExecutorHandle, JobHandler};
#[cfg(feature = "redis")]
pub use redis_store::RedisJobStore;
pub use store::{InMemoryJobStore, JobStore, JobStoreError};
pub use types::{Job, JobAttemptRecord, JobId, JobResult, JobState, JobStatus, RetryPolicy};
