//! Termination signal handling shared by primary and worker processes.

use tokio::signal::unix::{SignalKind, signal};

/// Wait for SIGTERM or SIGINT and return the name of the signal received.
///
/// If a handler cannot be installed the error is logged and that signal is
/// never reported.
pub async fn shutdown_signal() -> &'static str {
    let terminate = wait_for(SignalKind::terminate());
    let interrupt = wait_for(SignalKind::interrupt());

    tokio::select! {
        _ = terminate => "SIGTERM",
        _ = interrupt => "SIGINT",
    }
}

async fn wait_for(kind: SignalKind) {
    match signal(kind) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install signal handler");
            std::future::pending::<()>().await;
        }
    }
}
