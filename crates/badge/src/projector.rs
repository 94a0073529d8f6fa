//! Keeps the badge count equal to the persisted history length.

use std::sync::Arc;

use clipkeep_events::{emit_event, event_names, EventBusRef, HistoryChangedEvent, NullEventBus};
use clipkeep_storage::{decode_history, load_history, ChangeSignal, StorageError, StoreRef, HISTORY_KEY};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::display::BadgeDisplay;

/// Badge color used when none is configured.
pub const DEFAULT_BADGE_COLOR: &str = "#4B5563";

/// Projector lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeState {
    /// Nothing has been displayed yet.
    Uninitialized,
    /// The badge shows this count.
    Synced(usize),
}

/// Derives the badge count from the store.
///
/// It is driven by the store's change notifications, never by direct calls
/// from writers, so every process observing the store converges on the same
/// count.
pub struct BadgeProjector {
    store: StoreRef,
    display: Arc<dyn BadgeDisplay>,
    events: EventBusRef,
    color: String,
    max_entries: usize,
    state: BadgeState,
}

impl BadgeProjector {
    pub fn new(store: StoreRef, display: Arc<dyn BadgeDisplay>, max_entries: usize) -> Self {
        Self {
            store,
            display,
            events: Arc::new(NullEventBus),
            color: DEFAULT_BADGE_COLOR.to_string(),
            max_entries,
            state: BadgeState::Uninitialized,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Also publish `history:changed` events on `events`.
    pub fn with_event_bus(mut self, events: EventBusRef) -> Self {
        self.events = events;
        self
    }

    pub fn state(&self) -> BadgeState {
        self.state
    }

    /// Read the store and display the current count.
    pub async fn sync(&mut self) -> Result<usize, StorageError> {
        let entries = load_history(self.store.as_ref(), self.max_entries).await?;
        let count = entries.len();
        self.render(count);
        Ok(count)
    }

    /// Display the count carried by a change notification.
    pub fn apply_change(&mut self, value: Value) -> usize {
        let count = decode_history(Some(value), self.max_entries).len();
        self.render(count);
        count
    }

    fn render(&mut self, count: usize) {
        if self.state == BadgeState::Uninitialized {
            self.display.set_color(&self.color);
        }
        self.display.set_count(count);
        self.state = BadgeState::Synced(count);

        emit_event(
            self.events.as_ref(),
            event_names::HISTORY_CHANGED,
            &HistoryChangedEvent {
                count,
                ts_ms: chrono::Utc::now().timestamp_millis(),
            },
        );
    }

    /// Sync once, then follow change notifications until `cancel` fires or
    /// the store goes away.
    pub fn spawn(mut self, cancel: CancellationToken) -> JoinHandle<()> {
        // Subscribe before the initial read so no commit falls in between.
        let mut changes = self.store.on_change(HISTORY_KEY);

        tokio::spawn(async move {
            match self.sync().await {
                Ok(count) => tracing::info!(count, "badge synced"),
                Err(e) => tracing::warn!(error = %e, "initial badge sync failed, waiting for changes"),
            }

            loop {
                let signal = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    signal = changes.next() => signal,
                };

                match signal {
                    Some(ChangeSignal::Changed(change)) => {
                        let count = self.apply_change(change.value);
                        tracing::debug!(count, "badge updated");
                    }
                    Some(ChangeSignal::Lagged(_)) => {
                        if let Err(e) = self.sync().await {
                            tracing::warn!(error = %e, "badge resync failed");
                        }
                    }
                    None => break,
                }
            }

            tracing::debug!(state = ?self.state, "badge projector stopped");
        })
    }
}
