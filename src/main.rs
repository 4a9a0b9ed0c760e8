use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use webhook_receiver::{telemetry, Config, FsSink, Receiver};

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    let dispatch = telemetry::dispatch(&config.log_level);
    // Covers this task only; request handling gets the dispatcher via the receiver.
    let _guard = tracing::dispatcher::set_default(&dispatch);

    let addr = config.server_addr()?;
    info!(
        addr = %addr,
        storage_dir = %config.storage_dir.display(),
        max_body_bytes = config.max_body_bytes,
        "Configuration loaded"
    );

    let receiver = Receiver::new(Arc::new(FsSink::new(&config.storage_dir)))
        .with_dispatch(dispatch.clone())
        .with_max_body_bytes(config.max_body_bytes);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind HTTP server on {addr}"))?;
    info!(addr = %listener.local_addr()?, "Ready to receive webhooks");

    receiver
        .serve(listener, shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
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
}
