//! Clipboard poller - background task that samples the clipboard.

use std::sync::Arc;
use std::time::Duration;

use clipkeep_history::Clock;
use clipkeep_writer::{Applied, WriterError, WriterHandle};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::ClipboardError;
use crate::provider::{read_clipboard, ClipboardRef};

/// Default polling interval for clipboard changes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Result of one poll.
#[derive(Debug)]
pub enum PollOutcome {
    /// New clipboard text was submitted to the writer.
    Submitted(Applied),
    /// Clipboard text equals the last submitted value; nothing sent.
    Unchanged,
    /// The clipboard could not be read.
    Unreadable(ClipboardError),
    /// The writer rejected the insert; it will be retried next tick.
    Failed(WriterError),
}

/// Samples the clipboard on a fixed interval.
///
/// Keeps the last submitted text to avoid resubmitting unchanged content every
/// tick. The history's own dedup stays authoritative: a value copied, removed
/// by the user and still sitting on the clipboard is not re-added until the
/// clipboard changes.
pub struct ClipboardPoller {
    clipboard: ClipboardRef,
    writer: WriterHandle,
    clock: Arc<dyn Clock>,
    interval: Duration,
    last_seen: Option<String>,
    readable: bool,
}

impl ClipboardPoller {
    pub fn new(clipboard: ClipboardRef, writer: WriterHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            clipboard,
            writer,
            clock,
            interval: DEFAULT_POLL_INTERVAL,
            last_seen: None,
            readable: true,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Text most recently handed to the writer.
    pub fn last_seen(&self) -> Option<&str> {
        self.last_seen.as_deref()
    }

    /// Poll once.
    pub async fn poll_once(&mut self) -> PollOutcome {
        let text = match read_clipboard(&self.clipboard).await {
            Ok(text) => {
                if !self.readable {
                    tracing::info!("clipboard readable again");
                    self.readable = true;
                }
                text
            }
            Err(ClipboardError::Empty) => return PollOutcome::Unreadable(ClipboardError::Empty),
            Err(e) => {
                // Only log the transition, not every tick.
                if self.readable {
                    tracing::warn!(error = %e, "clipboard unreadable, will keep polling");
                    self.readable = false;
                }
                return PollOutcome::Unreadable(e);
            }
        };

        if self.last_seen.as_deref() == Some(text.as_str()) {
            return PollOutcome::Unchanged;
        }

        match self.writer.insert(text.clone(), self.clock.now_ms()).await {
            Ok(applied) => {
                tracing::debug!(changed = applied.changed, "polled clipboard submitted");
                self.last_seen = Some(text);
                PollOutcome::Submitted(applied)
            }
            Err(e) => {
                tracing::warn!(error = %e, "polled clipboard not saved");
                PollOutcome::Failed(e)
            }
        }
    }

    /// Run until `cancel` fires or the writer shuts down.
    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("ClipboardPoller started with interval {:?}", self.interval);

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                if let PollOutcome::Failed(WriterError::Closed) = self.poll_once().await {
                    tracing::debug!("writer closed, stopping poller");
                    break;
                }
            }

            tracing::info!("ClipboardPoller stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ScriptedClipboard;
    use clipkeep_history::{Entry, HistoryPolicy, ManualClock};
    use clipkeep_storage::MemoryStore;
    use clipkeep_writer::{WriterConfig, WriterCoordinator};

    struct Fixture {
        clipboard: Arc<ScriptedClipboard>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        writer: WriterHandle,
    }

    fn fixture() -> Fixture {
        let clipboard = Arc::new(ScriptedClipboard::new());
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let writer = WriterCoordinator::spawn(
            Arc::clone(&store) as _,
            WriterConfig {
                policy: HistoryPolicy::default(),
                ..WriterConfig::default()
            },
        );
        Fixture {
            clipboard,
            store,
            clock,
            writer,
        }
    }

    fn poller(f: &Fixture) -> ClipboardPoller {
        ClipboardPoller::new(
            Arc::clone(&f.clipboard) as _,
            f.writer.clone(),
            Arc::clone(&f.clock) as _,
        )
    }

    #[tokio::test]
    async fn test_unchanged_clipboard_is_not_resubmitted() {
        let f = fixture();
        let mut poller = poller(&f);
        f.clipboard.set_text("same");

        assert!(matches!(poller.poll_once().await, PollOutcome::Submitted(_)));
        assert!(matches!(poller.poll_once().await, PollOutcome::Unchanged));
        assert!(matches!(poller.poll_once().await, PollOutcome::Unchanged));

        assert_eq!(f.writer.status().committed(), 1);
        assert_eq!(f.writer.status().unchanged(), 0);
    }

    #[tokio::test]
    async fn test_changed_clipboard_is_submitted_newest_first() {
        let f = fixture();
        let mut poller = poller(&f);

        f.clipboard.set_text("one");
        poller.poll_once().await;
        f.clock.advance(1_500);
        f.clipboard.set_text("two");

        match poller.poll_once().await {
            PollOutcome::Submitted(applied) => {
                assert_eq!(
                    applied.entries,
                    vec![Entry::new("two", 1_500), Entry::new("one", 0)]
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(poller.last_seen(), Some("two"));
    }

    #[tokio::test]
    async fn test_empty_and_unavailable_are_tolerated() {
        let f = fixture();
        let mut poller = poller(&f);

        assert!(matches!(
            poller.poll_once().await,
            PollOutcome::Unreadable(ClipboardError::Empty)
        ));

        f.clipboard
            .push_result(Err(ClipboardError::Unavailable("locked".into())));
        assert!(matches!(
            poller.poll_once().await,
            PollOutcome::Unreadable(ClipboardError::Unavailable(_))
        ));

        f.clipboard.set_text("back");
        assert!(matches!(poller.poll_once().await, PollOutcome::Submitted(_)));
    }

    #[tokio::test]
    async fn test_failed_write_is_retried_next_tick() {
        let f = fixture();
        let mut poller = poller(&f);
        f.clipboard.set_text("retry me");

        f.store.fail_writes(true);
        assert!(matches!(
            poller.poll_once().await,
            PollOutcome::Failed(WriterError::Write(_))
        ));
        assert_eq!(poller.last_seen(), None);

        f.store.fail_writes(false);
        assert!(matches!(poller.poll_once().await, PollOutcome::Submitted(_)));
        assert_eq!(f.store.write_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_poller_samples_on_interval() {
        let f = fixture();
        f.clipboard.set_text("ticked");
        let cancel = CancellationToken::new();

        let handle = poller(&f)
            .with_interval(Duration::from_millis(100))
            .spawn(cancel.clone());

        tokio::time::sleep(Duration::from_millis(450)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(f.clipboard.reads() >= 4);
        assert_eq!(f.store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_poller_stops_when_writer_closes() {
        let f = fixture();
        f.clipboard.set_text("x");
        f.writer.shutdown().await;

        let handle = poller(&f)
            .with_interval(Duration::from_millis(10))
            .spawn(CancellationToken::new());

        handle.await.unwrap();
    }
}
