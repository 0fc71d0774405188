use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use notification_fanout::config::Settings;
use notification_fanout::server::{serve, AppState};
use notification_fanout::tasks::TokenSweepTask;
use notification_fanout::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing; the guard flushes spans on exit
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!("Configuration loaded");

    let state = AppState::new(settings.clone()).await?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start token sweep task in background
    let sweep_task = TokenSweepTask::new(
        settings.tokens.clone(),
        state.stores.tokens.clone(),
        shutdown_tx.subscribe(),
    );
    let sweep_handle = tokio::spawn(sweep_task.run());

    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    // Run server with graceful shutdown
    let result = serve(listener, state, shutdown_tx, shutdown_signal_handler()).await?;
    tracing::info!(
        sessions_closed = result.sessions_closed,
        queue_drained = result.queue_drained,
        "Shutdown sequence finished"
    );

    tracing::info!("Waiting for background tasks to finish...");
    let _ = sweep_handle.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
