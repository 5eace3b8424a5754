// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Bind `addr` and serve `app` until ctrl-c
pub async fn serve(addr: &str, app: Router) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    serve_with_listener(listener, app, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves
pub async fn serve_with_listener<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr().context("Listener has no local address")?;
    info!("API server listening on {}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
