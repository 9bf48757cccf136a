//! Shutdown signalling between the binary and a running pipeline.
//!
//! The pipeline checks the signal between log entries, so a shutdown never interrupts the rows
//! of the entry being replicated.

use std::sync::Arc;

use tokio::sync::watch;

/// Receiver side of the shutdown channel.
pub type ShutdownRx = watch::Receiver<()>;

/// Transmitter side of the shutdown channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownTx(Arc<watch::Sender<()>>);

impl ShutdownTx {
    /// Signals every receiver to stop.
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }

    /// Creates a receiver that only observes signals sent after this call.
    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Creates a new shutdown channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx(Arc::new(tx)), rx)
}

/// Returns whether a shutdown was signalled on `rx`.
///
/// A dropped transmitter does not count as a shutdown.
pub fn is_shutdown_requested(rx: &ShutdownRx) -> bool {
    matches!(rx.has_changed(), Ok(true))
}
