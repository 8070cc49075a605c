//! Signal handling for graceful shutdown.
//!
//! SIGINT (Ctrl+C) and SIGTERM stop the API server and let the worker pool
//! drain in-flight jobs.

use tokio::sync::watch;
use tracing::{info, warn};

/// Creates a shutdown signal receiver that triggers on SIGINT or SIGTERM.
///
/// Returns a `watch::Receiver<bool>` that changes to `true` when a shutdown
/// signal is received. The receiver can be cloned and shared across tasks.
pub fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Shutdown signal received");
        let _ = tx.send(true);
    });

    rx
}

/// Resolve once `rx` flips to `true` or its sender goes away.
pub async fn wait_for(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Wait for either SIGINT or SIGTERM.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
