//! Liveness endpoint and outbound keepalive self-ping.
//!
//! Bootstrap plumbing: hosting platforms probe `/healthz` to see the
//! process alive, and free tiers idle a process out unless something keeps
//! hitting its public URL.

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::watch;

/// Spawn the liveness HTTP server as a background tokio task.
///
/// Returns the `JoinHandle` so the caller can hold it for lifetime
/// management. The server shuts down when `shutdown_rx` signals true.
pub async fn start_health_server(
    port: u16,
    shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let bind = SocketAddr::from(([0, 0, 0, 0], port));

    let app = Router::new().route("/healthz", get(healthz));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|error| anyhow::anyhow!("failed to bind health server to {bind}: {error}"))?;

    tracing::info!(address = %bind, "health server started");

    let handle = tokio::spawn(async move {
        let mut shutdown_rx = shutdown_rx;
        let shutdown_signal = async move {
            let _ = shutdown_rx.wait_for(|shutdown| *shutdown).await;
        };

        if let Err(error) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!(%error, "health server failed");
        }
    });

    Ok(handle)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Ping a public URL on an interval. Failures are logged and the loop keeps
/// going.
pub fn spawn_keepalive(url: String, interval_secs: u64) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let client = reqwest::Client::new();
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        // the first tick fires immediately; skip it so startup isn't pinged
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match client.get(&url).send().await {
                Ok(response) => {
                    tracing::debug!(status = %response.status(), %url, "keepalive ping")
                }
                Err(error) => tracing::warn!(%error, %url, "keepalive ping failed"),
            }
        }
    })
}
