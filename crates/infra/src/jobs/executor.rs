//! Job executor: a pool of worker threads with retry handling.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::store::JobStore;
use super::types::{Job, JobResult, JobStatus};

/// Job handler function type.
pub type JobHandler = Box<dyn Fn(&Job) -> JobResult + Send + Sync>;

/// Job executor configuration.
#[derive(Debug, Clone)]
pub struct JobExecutorConfig {
    /// How often an idle worker polls for new jobs
    pub poll_interval: Duration,
    /// Number of worker threads
    pub concurrency: usize,
    /// Name for logging and thread names
    pub name: String,
    /// Running jobs older than this are considered orphaned
    pub lease: Duration,
    /// How often orphaned jobs are looked for
    pub reap_interval: Duration,
}

impl Default for JobExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            concurrency: 4,
            name: "job-executor".to_string(),
            lease: Duration::from_secs(300),
            reap_interval: Duration::from_secs(30),
        }
    }
}

impl JobExecutorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }
}

/// Handle to control a running executor.
#[derive(Debug)]
pub struct JobExecutorHandle {
    shutdown: Arc<AtomicBool>,
    joins: Vec<thread::JoinHandle<()>>,
    stats: Arc<Mutex<ExecutorStats>>,
}

impl JobExecutorHandle {
    /// Stop all workers after their current attempt and wait for them.
    pub fn shutdown(mut self) -> ExecutorStats {
        self.shutdown.store(true, Ordering::SeqCst);
        for join in self.joins.drain(..) {
            let _ = join.join();
        }
        self.stats()
    }

    /// Get current executor statistics.
    pub fn stats(&self) -> ExecutorStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

/// Executor runtime statistics.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutorStats {
    pub attempts: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub retries_scheduled: u64,
    pub jobs_requeued: u64,
    pub current_running: usize,
    pub uptime_secs: u64,
}

/// Background job executor.
///
/// Workers claim ready jobs from the store, run the handler registered for
/// the job kind and record the outcome. Retries are rescheduled through the
/// store, so a job between attempts occupies no worker.
pub struct JobExecutor<S: JobStore> {
    store: S,
    handlers: HashMap<String, JobHandler>,
}

impl<S: JobStore + 'static> JobExecutor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a job kind.
    pub fn register_handler<F>(&mut self, kind: impl Into<String>, handler: F)
    where
        F: Fn(&Job) -> JobResult + Send + Sync + 'static,
    {
        self.handlers.insert(kind.into(), Box::new(handler));
    }

    /// Spawn `config.concurrency` worker threads.
    pub fn spawn(self, config: JobExecutorConfig) -> std::io::Result<JobExecutorHandle> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(Mutex::new(ExecutorStats::default()));
        let executor = Arc::new(self);

        let mut joins = Vec::with_capacity(config.concurrency);
        for worker in 0..config.concurrency.max(1) {
            let executor = executor.clone();
            let config = config.clone();
            let shutdown = shutdown.clone();
            let stats = stats.clone();
            let join = thread::Builder::new()
                .name(format!("{}-{}", config.name, worker))
                .spawn(move || worker_loop(&executor, &config, worker, &shutdown, &stats))?;
            joins.push(join);
        }

        info!(executor = %config.name, workers = joins.len(), "job executor started");

        Ok(JobExecutorHandle {
            shutdown,
            joins,
            stats,
        })
    }

    /// Run one attempt of an already-claimed job and persist the outcome.
    ///
    /// Returns the error text when the attempt failed.
    pub fn execute_one(&self, job: &mut Job) -> Result<(), String> {
        let started = Utc::now();

        let result = match self.handlers.get(&job.kind) {
            Some(handler) => catch_unwind(AssertUnwindSafe(|| handler(&*job)))
                .unwrap_or_else(|_| JobResult::Failure("job handler panicked".to_string())),
            None => JobResult::Fatal(format!("no handler for job kind: {}", job.kind)),
        };

        let outcome = match result {
            JobResult::Success(output) => {
                job.mark_succeeded(output, started);
                Ok(())
            }
            JobResult::Failure(error) => {
                job.mark_failed(error.clone(), started);
                Err(error)
            }
            JobResult::Fatal(error) => {
                job.mark_fatal(error.clone(), started);
                Err(error)
            }
        };

        self.store.update(job).map_err(|e| e.to_string())?;
        outcome
    }
}

fn worker_loop<S: JobStore + 'static>(
    executor: &JobExecutor<S>,
    config: &JobExecutorConfig,
    worker: usize,
    shutdown: &AtomicBool,
    stats: &Mutex<ExecutorStats>,
) {
    debug!(executor = %config.name, worker, "worker started");
    let start_time = Instant::now();
    let mut last_reap: Option<Instant> = None;

    while !shutdown.load(Ordering::SeqCst) {
        if let Ok(mut s) = stats.lock() {
            s.uptime_secs = start_time.elapsed().as_secs();
        }

        // One worker looks for orphaned attempts.
        if worker == 0 && last_reap.is_none_or(|t| t.elapsed() >= config.reap_interval) {
            last_reap = Some(Instant::now());
            match executor.store.requeue_stale(config.lease) {
                Ok(0) => {}
                Ok(n) => {
                    warn!(executor = %config.name, requeued = n, "requeued stale running jobs");
                    if let Ok(mut s) = stats.lock() {
                        s.jobs_requeued += n as u64;
                    }
                }
                Err(e) => error!(executor = %config.name, error = %e, "failed to requeue stale jobs"),
            }
        }

        match executor.store.claim_next() {
            Ok(Some(mut job)) => {
                debug!(
                    executor = %config.name,
                    job_id = %job.id,
                    kind = %job.kind,
                    attempt = job.attempt,
                    "claimed job"
                );

                if let Ok(mut s) = stats.lock() {
                    s.current_running += 1;
                }

                let result = executor.execute_one(&mut job);

                if let Ok(mut s) = stats.lock() {
                    s.current_running = s.current_running.saturating_sub(1);
                    s.attempts += 1;
                    match &job.status {
                        JobStatus::Succeeded => s.jobs_succeeded += 1,
                        JobStatus::Failed { .. } => s.jobs_failed += 1,
                        JobStatus::Retrying { .. } => s.retries_scheduled += 1,
                        _ => {}
                    }
                }

                match (result, &job.status) {
                    (Ok(()), _) => debug!(job_id = %job.id, "job succeeded"),
                    (Err(e), JobStatus::Retrying { attempt, .. }) => warn!(
                        job_id = %job.id,
                        attempt,
                        retry_at = ?job.scheduled_at,
                        error = %e,
                        "job attempt failed, retry scheduled"
                    ),
                    (Err(e), _) => error!(
                        job_id = %job.id,
                        attempts = job.attempt,
                        error = %e,
                        "job failed"
                    ),
                }
            }
            Ok(None) => thread::sleep(config.poll_interval),
            Err(e) => {
                error!(executor = %config.name, error = %e, "failed to claim job");
                thread::sleep(config.poll_interval);
            }
        }
    }

    debug!(executor = %config.name, worker, "worker stopped");
}
