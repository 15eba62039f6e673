//! HTTP server initialization and runtime setup.
//!
//! Builds the pipeline, starts the rate-limit janitor, and runs the Axum server
//! until Ctrl-C or SIGTERM.

use crate::config::Config;
use crate::routes::{Collaborators, app_router};
use crate::state::AppState;

use anyhow::Result;
use axum::ServiceExt;
use axum::extract::Request;
use std::net::SocketAddr;

/// Runs the HTTP server with the given configuration and route collaborators.
///
/// Initializes:
/// - Shared state (asset store, rate-limit counters)
/// - Background purge of expired rate-limit windows
/// - Request pipeline
/// - Axum HTTP server with graceful shutdown
///
/// # Errors
///
/// Returns an error if:
/// - The pipeline cannot be built from the configuration
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config, collaborators: Collaborators) -> Result<()> {
    let state = AppState::new(config.pipeline.clone());

    let janitor = state.limiter.spawn_janitor();
    tracing::info!("Rate-limit janitor started");

    let app = app_router(state, collaborators)?;

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        "Listening on http://{addr} ({})",
        config.pipeline.environment
    );

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    janitor.abort();
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
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
                tracing::error!("Failed to listen for SIGTERM: {e}");
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
}
