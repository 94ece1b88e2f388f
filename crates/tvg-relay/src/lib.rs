//! tvg-relay: same-origin HTTP relay for live streams.
//!
//! This crate ties the core configuration into a running Axum server. It
//! provides:
//!
//! - `/stream` and `/segment` relay endpoints with manifest rewriting
//! - A hostname allow-list guarding every upstream fetch
//! - A read-only channel catalog API under `/api`
//! - Graceful shutdown via signal handling

pub mod allow;
pub mod context;
pub mod error;
pub mod middleware;
pub mod rewrite;
pub mod router;
pub mod routes;
pub mod upstream;

use std::net::SocketAddr;

use tvg_core::{Config, Error};

pub use allow::AllowList;
pub use context::RelayContext;
pub use router::build_router;

/// Start the relay server.
///
/// This is the main entry point. It validates the configuration, constructs
/// the [`RelayContext`], and serves HTTP until a shutdown signal arrives.
pub async fn serve(config: Config) -> tvg_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| Error::Internal(format!("Invalid server address: {e}")))?;

    let static_dir = config.server.static_dir.clone();
    let ctx = RelayContext::new(config)?;
    if ctx.allow_list.is_empty() {
        tracing::warn!("Upstream allow-list is empty; every relay request will be refused");
    }
    tracing::info!(channels = ctx.catalog.len(), "Loaded channel catalog");

    let app = router::build_router(ctx, static_dir);

    tracing::info!("Starting relay on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Internal(format!("Server error: {e}")))?;

    tracing::info!("Relay shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_router() {
        // Verify that all the types compose correctly.
        let ctx = RelayContext::new(Config::default()).unwrap();
        let _app = router::build_router(ctx, None);
    }
}
