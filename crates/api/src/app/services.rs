//! Service wiring: history store + job queue, in-memory or Redis-backed.

use std::sync::Arc;

use fraudwatch_ai::{FraudClassifier, OllamaClient};
use fraudwatch_infra::fraud::register_analysis_handler;
use fraudwatch_infra::history::HistoryStoreError;
use fraudwatch_infra::jobs::JobExecutorHandle;
use fraudwatch_infra::{
    FraudQueue, InMemoryHistoryStore, InMemoryJobStore, JobExecutor, JobStoreError, Settings, UserHistory,
};

/// Shared state of the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub history: UserHistory,
    pub queue: FraudQueue,
}

/// Services plus the in-process worker pool, when there is one.
pub struct Runtime {
    pub services: Arc<AppServices>,
    pub executor: Option<JobExecutorHandle>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to start job workers: {0}")]
    Workers(#[from] std::io::Error),
    #[error(transparent)]
    History(#[from] HistoryStoreError),
    #[error(transparent)]
    Queue(#[from] JobStoreError),
}

impl AppServices {
    pub fn new(history: UserHistory, queue: FraudQueue) -> Self {
        Self { history, queue }
    }
}

pub fn build_services(settings: &Settings) -> Result<Runtime, StartupError> {
    if settings.use_persistent_stores {
        #[cfg(feature = "redis")]
        {
            return build_persistent_services(settings);
        }
        #[cfg(not(feature = "redis"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORES=true but redis feature not enabled, falling back to in-memory"
            );
        }
    }

    let classifier: Arc<dyn FraudClassifier> = Arc::new(OllamaClient::new(settings.ollama_config()));
    build_in_memory_services(settings, classifier)
}

/// In-memory stores with an embedded worker pool (dev/test).
pub fn build_in_memory_services(
    settings: &Settings,
    classifier: Arc<dyn FraudClassifier>,
) -> Result<Runtime, StartupError> {
    build_in_memory_services_on(InMemoryJobStore::arc(), settings, classifier)
}

/// Like [`build_in_memory_services`], on a caller-owned job store.
pub fn build_in_memory_services_on(
    store: Arc<InMemoryJobStore>,
    settings: &Settings,
    classifier: Arc<dyn FraudClassifier>,
) -> Result<Runtime, StartupError> {
    let queue = FraudQueue::new(store.clone(), settings.retry_policy());
    let history = UserHistory::new(Arc::new(InMemoryHistoryStore::new()));

    tracing::info!(classifier = classifier.name(), "using in-memory stores with embedded workers");

    let mut executor = JobExecutor::new(store);
    register_analysis_handler(&mut executor, classifier);
    let handle = executor.spawn(settings.executor_config("api-embedded"))?;

    Ok(Runtime {
        services: Arc::new(AppServices::new(history, queue)),
        executor: Some(handle),
    })
}

/// Redis history + Redis job queue; jobs run in `fraudwatch-worker`.
#[cfg(feature = "redis")]
pub fn build_persistent_services(settings: &Settings) -> Result<Runtime, StartupError> {
    use fraudwatch_infra::history::RedisHistoryStore;
    use fraudwatch_infra::jobs::RedisJobStore;

    let history_store = RedisHistoryStore::new(
        settings.history.redis_url(),
        settings.history.namespace.clone(),
        settings.history.set.clone(),
        settings.history.timeout,
    )?;
    let job_store = RedisJobStore::new(&settings.queue.redis_url, settings.queue.result_ttl)?;

    tracing::info!(
        history = %settings.history.redis_url(),
        queue = %settings.queue.redis_url,
        "using redis-backed stores"
    );

    Ok(Runtime {
        services: Arc::new(AppServices::new(
            UserHistory::new(Arc::new(history_store)),
            FraudQueue::new(Arc::new(job_store), settings.retry_policy()),
        )),
        executor: None,
    })
}
