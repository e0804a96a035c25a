use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    fraudwatch_observability::init();

    let settings = fraudwatch_infra::Settings::from_env().context("invalid configuration")?;
    let runtime = fraudwatch_api::app::services::build_services(&settings).context("failed to build services")?;

    let app = fraudwatch_api::app::build_app(runtime.services.clone());

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(executor) = runtime.executor {
        // Worker threads block on in-flight inference calls.
        let stats = tokio::task::spawn_blocking(move || executor.shutdown()).await?;
        tracing::info!(?stats, "embedded workers stopped");
    }

    tracing::info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
