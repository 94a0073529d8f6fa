//! Event-driven capture.
//!
//! Copy, shortcut and selection signals arrive on a channel. Each one waits a
//! short settle delay (the OS clipboard is updated after the copy event fires),
//! reads the clipboard and submits an insert.

use std::sync::Arc;
use std::time::Duration;

use clipkeep_history::Clock;
use clipkeep_writer::{Applied, WriterHandle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::CaptureError;
use crate::provider::{read_clipboard, ClipboardRef};

/// Delay between a copy signal and the clipboard read.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Signals that a copy may have happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTrigger {
    /// A copy event was observed.
    Copy,
    /// A copy shortcut (Ctrl+C / Cmd+C) was pressed.
    Shortcut,
    /// The selection changed.
    Selection,
    /// The user explicitly asked for a capture.
    Manual,
}

impl CaptureTrigger {
    pub fn label(&self) -> &'static str {
        match self {
            CaptureTrigger::Copy => "copy",
            CaptureTrigger::Shortcut => "shortcut",
            CaptureTrigger::Selection => "selection",
            CaptureTrigger::Manual => "manual",
        }
    }
}

/// Sending half used by whatever observes copy signals.
pub type TriggerSender = mpsc::Sender<CaptureTrigger>;

/// Create a trigger channel holding up to `capacity` pending signals.
pub fn trigger_channel(capacity: usize) -> (TriggerSender, mpsc::Receiver<CaptureTrigger>) {
    mpsc::channel(capacity.max(1))
}

/// Reads the clipboard in response to capture triggers.
#[derive(Clone)]
pub struct EventCapture {
    clipboard: ClipboardRef,
    writer: WriterHandle,
    clock: Arc<dyn Clock>,
    settle_delay: Duration,
}

impl EventCapture {
    pub fn new(clipboard: ClipboardRef, writer: WriterHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            clipboard,
            writer,
            clock,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Capture once: settle, read, submit.
    pub async fn capture(&self, trigger: CaptureTrigger) -> Result<Applied, CaptureError> {
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let text = read_clipboard(&self.clipboard).await?;
        let applied = self.writer.insert(text, self.clock.now_ms()).await?;

        tracing::debug!(
            trigger = trigger.label(),
            changed = applied.changed,
            len = applied.entries.len(),
            "clipboard captured"
        );
        Ok(applied)
    }

    /// Run until `cancel` fires or every trigger sender is dropped.
    pub fn spawn(
        self,
        mut triggers: mpsc::Receiver<CaptureTrigger>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(settle_ms = self.settle_delay.as_millis() as u64, "event capture started");

            loop {
                let trigger = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    trigger = triggers.recv() => trigger,
                };

                let Some(trigger) = trigger else {
                    tracing::debug!("capture trigger channel closed");
                    break;
                };

                match self.capture(trigger).await {
                    Ok(_) => {}
                    Err(CaptureError::Clipboard(e)) => {
                        tracing::debug!(trigger = trigger.label(), error = %e, "clipboard not captured");
                    }
                    Err(CaptureError::Writer(e)) => {
                        tracing::warn!(trigger = trigger.label(), error = %e, "captured text not saved");
                    }
                }
            }

            tracing::info!("event capture stopped");
        })
    }
}
