//! Infrastructure layer: configuration, history store, job queue and the
//! fraud analysis wiring on top of them.

pub mod config;
pub mod fraud;
pub mod history;
pub mod jobs;

pub use config::{ConfigError, Settings};
pub use fraud::{ANALYZE_TRANSACTION, AnalysisStatus, FraudQueue};
pub use history::{HistoryStore, HistoryStoreError, InMemoryHistoryStore, UserHistory};
pub use jobs::{InMemoryJobStore, JobExecutor, JobExecutorConfig, JobExecutorHandle, JobState, JobStore, JobStoreError};
