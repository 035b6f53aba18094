//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint shared by both binaries. The proxy reports its session
//! counters; the consumer reports the state of its push stream.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::ConsumerEvent;
use crate::domain::connection::ConnectionState;
use crate::infrastructure::grpc::server::SessionStats;
use crate::infrastructure::metrics::get_metrics_handle;

/// Consecutive failures at which the consumer reports unhealthy.
const UNHEALTHY_FAILURES: u32 = 5;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Binary version.
    pub version: String,
    /// Process uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Component-specific details.
    pub component: ComponentReport,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All systems operational.
    Healthy,
    /// Functional but recovering.
    Degraded,
    /// Not doing useful work.
    Unhealthy,
}

/// What the process reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ComponentReport {
    /// Streaming proxy.
    Proxy(ProxyReport),
    /// Push consumer.
    Consumer(ConsumerReport),
}

/// Proxy session counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyReport {
    /// Sessions currently open.
    pub active_sessions: usize,
    /// Sessions opened since start.
    pub total_sessions: u64,
}

/// Consumer connection status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerReport {
    /// `disconnected`, `connecting` or `streaming`.
    pub state: &'static str,
    /// Failures since the last received envelope.
    pub consecutive_failures: u32,
    /// Connection attempts since start.
    pub attempts: u64,
    /// Most recent connection or stream error.
    pub last_error: Option<String>,
}

// =============================================================================
// Consumer Status
// =============================================================================

/// Consumer status folded from [`ConsumerEvent`]s.
#[derive(Debug, Default)]
pub struct ConsumerStatus {
    inner: RwLock<ConsumerStatusInner>,
}

#[derive(Debug, Default)]
struct ConsumerStatusInner {
    state: ConnectionState,
    consecutive_failures: u32,
    attempts: u64,
    last_error: Option<String>,
}

impl ConsumerStatus {
    /// Create a status in the `disconnected` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one lifecycle event.
    pub fn apply(&self, event: &ConsumerEvent) {
        let mut inner = self.inner.write();
        match event {
            ConsumerEvent::Backoff {
                consecutive_failures,
                ..
            } => {
                inner.state = ConnectionState::Disconnected;
                inner.consecutive_failures = *consecutive_failures;
            }
            ConsumerEvent::Connecting { attempt } => {
                inner.state = ConnectionState::Connecting;
                inner.attempts = *attempt;
            }
            ConsumerEvent::Connected { attempt } => {
                inner.state = ConnectionState::Streaming;
                inner.attempts = *attempt;
            }
            ConsumerEvent::AttemptFailed {
                error,
                consecutive_failures,
            } => {
                inner.state = ConnectionState::Disconnected;
                inner.consecutive_failures = *consecutive_failures;
                inner.last_error = Some(error.to_string());
            }
            ConsumerEvent::StreamEnded {
                error,
                consecutive_failures,
                ..
            } => {
                inner.state = ConnectionState::Disconnected;
                inner.consecutive_failures = *consecutive_failures;
                if let Some(error) = error {
                    inner.last_error = Some(error.to_string());
                }
            }
            ConsumerEvent::Stopped => inner.state = ConnectionState::Disconnected,
        }
    }

    /// Snapshot the current status.
    #[must_use]
    pub fn report(&self) -> ConsumerReport {
        let inner = self.inner.read();
        ConsumerReport {
            state: inner.state.as_str(),
            consecutive_failures: inner.consecutive_failures,
            attempts: inner.attempts,
            last_error: inner.last_error.clone(),
        }
    }
}

// =============================================================================
// Health Server State
// =============================================================================

enum Component {
    Proxy(Arc<SessionStats>),
    Consumer(Arc<ConsumerStatus>),
}

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    component: Component,
}

impl HealthServerState {
    /// State for the streaming proxy.
    #[must_use]
    pub fn proxy(version: String, stats: Arc<SessionStats>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            component: Component::Proxy(stats),
        }
    }

    /// State for the push consumer.
    #[must_use]
    pub fn consumer(version: String, status: Arc<ConsumerStatus>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            component: Component::Consumer(status),
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

/// Routes served by [`HealthServer`].
#[must_use]
pub fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let ready = match &state.component {
        Component::Proxy(_) => true,
        Component::Consumer(status) => {
            status.report().state == ConnectionState::Streaming.as_str()
        }
    };

    if ready {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let component = match &state.component {
        Component::Proxy(stats) => ComponentReport::Proxy(ProxyReport {
            active_sessions: stats.active(),
            total_sessions: stats.total(),
        }),
        Component::Consumer(status) => ComponentReport::Consumer(status.report()),
    };

    HealthResponse {
        status: determine_health_status(&component),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        component,
    }
}

fn determine_health_status(component: &ComponentReport) -> HealthStatus {
    match component {
        ComponentReport::Proxy(_) => HealthStatus::Healthy,
        ComponentReport::Consumer(report) if report.state == ConnectionState::Streaming.as_str() => {
            HealthStatus::Healthy
        }
        ComponentReport::Consumer(report) if report.consecutive_failures >= UNHEALTHY_FAILURES => {
            HealthStatus::Unhealthy
        }
        ComponentReport::Consumer(_) => HealthStatus::Degraded,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
