use docx_service::config::DocxConfig;
use docx_service::services::init_metrics;
use docx_service::startup::Application;
use docx_service::workers::{sweep_interval, RetentionSweeper};
use service_core::error::AppError;
use service_core::observability::init_tracing;
use tokio::signal;
use tokio_util::sync::CancellationToken;

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Metrics recorder must exist before anything is recorded
    init_metrics();

    let config = DocxConfig::load()?;

    init_tracing(
        "docx-service",
        &config.common.log_level,
        config.common.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        environment = %config.environment,
        storage = %config.storage.local_path.display(),
        templates = %config.templates_dir.display(),
        "Starting docx service"
    );

    let retention = config.storage.retention();
    let app = Application::build(config).await?;

    let sweeper = RetentionSweeper::new(app.store(), retention, sweep_interval(retention));
    let shutdown = sweeper.shutdown_token();
    let sweeper_handle = tokio::spawn(sweeper.start());

    app.run_until(shutdown_signal(shutdown.clone())).await?;

    shutdown.cancel();
    if let Err(e) = sweeper_handle.await {
        tracing::warn!(error = %e, "Retention sweeper task ended abnormally");
    }

    Ok(())
}
