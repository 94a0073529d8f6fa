//! Periodic expiry of old entries.

use std::sync::Arc;
use std::time::Duration;

use clipkeep_history::Clock;
use clipkeep_writer::{Applied, Result, WriterError, WriterHandle};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Default interval between expiry sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Submits `expire(now)` on a fixed interval.
pub struct ExpirySweeper {
    writer: WriterHandle,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(writer: WriterHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            writer,
            clock,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sweep once with the current time.
    pub async fn sweep(&self) -> Result<Applied> {
        let applied = self.writer.expire(self.clock.now_ms()).await?;
        if applied.changed {
            tracing::info!(remaining = applied.entries.len(), "expired old clipboard entries");
        }
        Ok(applied)
    }

    /// Run until `cancel` fires or the writer shuts down.
    ///
    /// The first sweep runs immediately so entries that aged out while the
    /// process was not running are dropped at startup.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("ExpirySweeper started with interval {:?}", self.interval);

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match self.sweep().await {
                    Ok(_) => {}
                    Err(WriterError::Closed) => break,
                    // Retried on the next tick.
                    Err(e) => tracing::warn!(error = %e, "expiry sweep failed"),
                }
            }

            tracing::info!("ExpirySweeper stopped");
        })
    }
}
