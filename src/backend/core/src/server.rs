//! HTTP server bootstrap.

use std::net::SocketAddr;

use axum::Router;
use tracing::{error, info, Instrument, Span};

/// Serve `app` on `0.0.0.0:<port>` until Ctrl-C or SIGTERM.
///
/// In-flight requests are drained before returning. `root` is the service
/// span returned by [`crate::telemetry::init_logging`].
pub async fn serve(app: Router, port: u16, root: Span) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    async move {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(address = %addr, "Starting HTTP server");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        info!("Server shutdown complete");
        Ok(())
    }
    .instrument(root)
    .await
}

/// Wait for shutdown signal.
///
/// If a handler cannot be installed the error is logged and that signal is
/// ignored; the other one still triggers shutdown.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
