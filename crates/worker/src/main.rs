//! Fraud analysis worker: pulls jobs from the Redis queue and runs them
//! against the inference service.

use std::sync::Arc;

use anyhow::Context;

use fraudwatch_ai::{FraudClassifier, OllamaClient};
use fraudwatch_infra::Settings;
use fraudwatch_infra::fraud::register_analysis_handler;
use fraudwatch_infra::jobs::{JobExecutor, RedisJobStore};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    fraudwatch_observability::init();

    let settings = Settings::from_env().context("invalid configuration")?;

    let store = RedisJobStore::new(&settings.queue.redis_url, settings.queue.result_ttl)
        .context("failed to open job queue")?;
    let classifier: Arc<dyn FraudClassifier> = Arc::new(OllamaClient::new(settings.ollama_config()));

    let mut executor = JobExecutor::new(store);
    register_analysis_handler(&mut executor, classifier);

    let handle = executor
        .spawn(settings.executor_config("fraudwatch-worker"))
        .context("failed to start worker threads")?;

    tracing::info!(
        queue = %settings.queue.redis_url,
        model = %settings.inference.model,
        concurrency = settings.queue.concurrency,
        "worker started"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl+C")?;
    tracing::info!("received shutdown signal; waiting for in-flight jobs");

    let stats = tokio::task::spawn_blocking(move || handle.shutdown()).await?;
    tracing::info!(?stats, "worker stopped");
    Ok(())
}
