//! Graceful Shutdown Handler
//!
//! Waits for an OS signal, then runs the finalizers of a runtime.

use crate::runtime::FaultRuntime;
use std::sync::Arc;
use tokio::signal;

/// Runs a runtime's finalizers once a shutdown signal arrives.
///
/// # Example
///
/// ```rust,no_run
/// use faultline::FaultRuntime;
/// use faultline::lifecycle::ShutdownHandler;
///
/// # async fn run() {
/// let handler = ShutdownHandler::new(FaultRuntime::global());
///
/// tokio::spawn(async move {
///     handler.wait_for_shutdown().await;
///     std::process::exit(0);
/// });
/// # }
/// ```
pub struct ShutdownHandler {
    runtime: Arc<FaultRuntime>,
}

impl ShutdownHandler {
    pub fn new(runtime: Arc<FaultRuntime>) -> Self {
        Self { runtime }
    }

    /// Wait for Ctrl+C or SIGTERM, then run the finalizers.
    pub async fn wait_for_shutdown(&self) {
        shutdown_signal().await;
        self.shutdown();
    }

    /// Run the finalizers now. Returns how many ran.
    pub fn shutdown(&self) -> usize {
        tracing::info!("Starting graceful shutdown...");
        let executed = self.runtime.shutdown();
        tracing::info!(executed, "Graceful shutdown complete");
        executed
    }
}

/// Create a future that completes when a shutdown signal is received
///
/// A signal listener that cannot be installed is logged and never completes,
/// so the other signal can still end the wait.
///
/// # Example
///
/// ```rust,ignore
/// use faultline::lifecycle::shutdown_signal;
///
/// axum::serve(listener, app)
///     .with_graceful_shutdown(shutdown_signal())
///     .await?;
/// ```
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}
