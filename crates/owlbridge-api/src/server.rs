//! Status server.

use std::future::Future;
use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;

use owlbridge_core::HealthState;

use crate::handlers::status_handler;

/// Build the router.
pub fn create_router(health: HealthState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .with_state(health)
}

/// Serve the status endpoint until `shutdown` resolves.
pub async fn run<F>(bind: SocketAddr, health: HealthState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(category = "api", "Status endpoint listening on http://{}/status", bind);

    axum::serve(listener, create_router(health))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!(category = "api", "Status endpoint stopped");
    Ok(())
}
