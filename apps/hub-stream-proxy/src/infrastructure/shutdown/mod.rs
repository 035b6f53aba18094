//! Shutdown Signals
//!
//! Both binaries stop on SIGINT or SIGTERM by cancelling a shared token.

use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Time allowed for tasks to drain after the signal.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait for SIGINT or SIGTERM, then cancel `shutdown_token`.
///
/// # Panics
///
/// Panics if the signal handlers cannot be installed.
#[allow(clippy::expect_used)]
pub async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
        () = shutdown_token.cancelled() => {
            tracing::info!("Shutdown requested internally");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}

/// Wait for `task` to finish, giving up after [`SHUTDOWN_TIMEOUT`].
pub async fn drain<F: std::future::Future>(name: &'static str, task: F) {
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await.is_err() {
        tracing::warn!(
            task = name,
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Task did not stop before the shutdown timeout"
        );
    }
}
