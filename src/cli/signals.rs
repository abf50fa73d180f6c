//! Shutdown signal handling

use colored::Colorize;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

/// Resolves once SIGINT or SIGTERM has been received
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Install handlers for SIGINT and SIGTERM
    pub fn install() -> Result<Self, std::io::Error> {
        let (tx, rx) = watch::channel(false);

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::spawn(async move {
            let name = tokio::select! {
                _ = sigint.recv() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            };
            eprintln!("{} Received {} (shutting down)", "↓".cyan(), name);
            let _ = tx.send(true);
        });

        Ok(Self { receiver: rx })
    }

    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait for the shutdown request
    pub async fn wait(&mut self) {
        // A dropped sender means the handler task is gone; treat as shutdown
        let _ = self.receiver.wait_for(|requested| *requested).await;
    }
}
