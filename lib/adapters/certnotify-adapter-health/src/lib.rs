//! Liveness and readiness endpoints.
//!
//! - `GET /health` - 200 `OK` while healthy, 503 otherwise
//! - `GET /ready` - 200 `Ready` while healthy, 503 otherwise
//!
//! Both read the shared [`HealthState`]; this module never writes it.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use certnotify_domain::HealthState;

pub async fn health_handler(State(health): State<HealthState>) -> (StatusCode, &'static str) {
    if health.is_healthy() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
    }
}

pub async fn ready_handler(State(health): State<HealthState>) -> (StatusCode, &'static str) {
    if health.is_healthy() {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Not Ready")
    }
}

/// Upper bound on a single health request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn build_router(health: HealthState) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .with_state(health);
    with_request_timeout(router, REQUEST_TIMEOUT)
}

/// Requests still running after `timeout` are answered with 408.
fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router.layer(TimeoutLayer::new(timeout))
}

/// Bound health endpoint, ready to serve.
pub struct HealthServer {
    listener: TcpListener,
    health: HealthState,
}

impl HealthServer {
    /// Binds on all interfaces; fails if the port is taken.
    pub async fn bind(port: u16, health: HealthState) -> Result<Self> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind health server on {addr}"))?;
        Ok(Self { listener, health })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until `shutdown` is cancelled.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.local_addr()?;
        info!(%addr, "health server listening");
        axum::serve(self.listener, build_router(self.health))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context("health server failed")
    }
}
