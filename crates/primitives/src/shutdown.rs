use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

/// A future that resolves when the process receives a shutdown signal
/// (SIGINT or SIGTERM).
#[derive(Debug, Default, Clone, Copy)]
pub struct ShutdownSignal;

impl ShutdownSignal {
    /// Creates a new shutdown signal listener.
    pub const fn new() -> Self {
        Self
    }

    /// Wait until a shutdown signal is received.
    pub async fn wait(self) {
        let ctrl_c = tokio::signal::ctrl_c();

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                info!(error = %e, "Failed to install SIGTERM handler, relying on ctrl-c only");
                let _ = ctrl_c.await;
                return;
            }
        };

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
    }
}
