//! What a viewer can do with the clipboard history.
//!
//! Reads go straight to the store and may be slightly behind a commit in
//! flight. Every change goes through the writer.

use std::sync::Arc;

use clipkeep_capture::{read_clipboard, ClipboardError, ClipboardRef, ClipboardSink};
use clipkeep_events::{
    emit_event, event_names, CaptureFailedEvent, EventBusRef, MutationFailedEvent,
};
use clipkeep_history::{Clock, Entry};
use clipkeep_storage::{load_history, ChangeStream, StoreRef, HISTORY_KEY};
use clipkeep_writer::{Applied, WriterError, WriterHandle};

use crate::error::Result;

/// Viewer-facing facade over the history.
#[derive(Clone)]
pub struct ClipboardHistory {
    store: StoreRef,
    writer: WriterHandle,
    clipboard: ClipboardRef,
    sink: Arc<dyn ClipboardSink>,
    events: EventBusRef,
    clock: Arc<dyn Clock>,
}

impl ClipboardHistory {
    pub fn new(
        store: StoreRef,
        writer: WriterHandle,
        clipboard: ClipboardRef,
        sink: Arc<dyn ClipboardSink>,
        events: EventBusRef,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            writer,
            clipboard,
            sink,
            events,
            clock,
        }
    }

    /// Current entries, newest first.
    pub async fn entries(&self) -> Result<Vec<Entry>> {
        let max_entries = self.writer.policy().max_entries;
        Ok(load_history(self.store.as_ref(), max_entries).await?)
    }

    pub async fn count(&self) -> Result<usize> {
        Ok(self.entries().await?.len())
    }

    /// Notifications of every committed change, for re-rendering.
    pub fn watch(&self) -> ChangeStream {
        self.store.on_change(HISTORY_KEY)
    }

    /// Insert explicit text as if it had just been copied.
    pub async fn add(&self, text: &str) -> Result<Applied> {
        let result = self.writer.insert(text, self.clock.now_ms()).await;
        self.report("insert", result)
    }

    pub async fn remove(&self, text: &str) -> Result<Applied> {
        let result = self.writer.remove(text).await;
        self.report("remove", result)
    }

    pub async fn clear(&self) -> Result<Applied> {
        let result = self.writer.clear().await;
        self.report("clear", result)
    }

    /// "Capture now": read the clipboard and insert its text.
    ///
    /// A failure publishes `capture:failed` so the viewer can show a
    /// non-blocking notification.
    pub async fn capture_now(&self) -> Result<Applied> {
        let text = match read_clipboard(&self.clipboard).await {
            Ok(text) => text,
            Err(e) => {
                tracing::info!(error = %e, "manual capture failed");
                emit_event(
                    self.events.as_ref(),
                    event_names::CAPTURE_FAILED,
                    &CaptureFailedEvent {
                        reason: e.to_string(),
                        permission_denied: e == ClipboardError::PermissionDenied,
                    },
                );
                return Err(e.into());
            }
        };

        let result = self.writer.insert(text, self.clock.now_ms()).await;
        self.report("insert", result)
    }

    /// Put an entry back on the system clipboard.
    pub async fn copy(&self, text: &str) -> Result<()> {
        let sink = Arc::clone(&self.sink);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || sink.write_text(&text))
            .await
            .map_err(|e| ClipboardError::Unavailable(format!("clipboard task failed: {e}")))??;
        Ok(())
    }

    fn report(
        &self,
        mutation: &'static str,
        result: std::result::Result<Applied, WriterError>,
    ) -> Result<Applied> {
        if let Err(e) = &result {
            emit_event(
                self.events.as_ref(),
                event_names::MUTATION_FAILED,
                &MutationFailedEvent {
                    mutation: mutation.to_string(),
                    error: e.to_string(),
                },
            );
        }
        Ok(result?)
    }
}
