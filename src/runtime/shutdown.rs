//! Process-wide shutdown signal.
//!
//! One [`ShutdownTx`] is owned by the orchestrator; every watch producer and
//! update loop holds a [`ShutdownRx`]. Dropping the sender counts as a shutdown.

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<()>);

impl ShutdownTx {
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }

    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

pub type ShutdownRx = watch::Receiver<()>;

pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx(tx), rx)
}

/// Whether shutdown was signalled (or the sender dropped) since `rx` last looked
pub fn shutdown_requested(rx: &ShutdownRx) -> bool {
    rx.has_changed().unwrap_or(true)
}
