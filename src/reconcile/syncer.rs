//! Fixed-interval sync driver.

use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;

/// The single-slot channel between the Syncer and the Watcher.
pub fn sync_channel() -> (mpsc::Sender<()>, mpsc::Receiver<()>) {
    mpsc::channel(1)
}

/// Signals the Watcher to run a full sync: once immediately, then every
/// `interval`. A signal the Watcher has not consumed yet is never doubled up.
pub struct Syncer {
    interval: Duration,
    sync_tx: mpsc::Sender<()>,
}

impl Syncer {
    pub fn new(interval: Duration, sync_tx: mpsc::Sender<()>) -> Self {
        Self { interval, sync_tx }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::convert::Infallible> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval = ?self.interval, "syncer started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                _ = ticker.tick() => match self.sync_tx.try_send(()) {
                    Ok(()) => tracing::debug!("sync-requested"),
                    Err(TrySendError::Full(())) => tracing::debug!("sync-pending, signal dropped"),
                    Err(TrySendError::Closed(())) => {
                        tracing::info!("sync receiver gone");
                        break;
                    }
                },
            }
        }

        tracing::info!("syncer stopped");
        Ok(())
    }
}
