//! Clipboard access traits.
//!
//! These abstract the platform clipboard so the actors stay testable.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::ClipboardError;

/// Read access to the system clipboard.
pub trait ClipboardSource: Send + Sync {
    /// Current clipboard text. Empty text is reported as `ClipboardError::Empty`.
    fn read_text(&self) -> Result<String, ClipboardError>;
}

/// Write access to the system clipboard.
pub trait ClipboardSink: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Type alias for a shared clipboard source.
pub type ClipboardRef = Arc<dyn ClipboardSource>;

/// Read the clipboard off the async executor.
///
/// Platform clipboard calls may block on the display server, so they run on
/// the blocking pool.
pub async fn read_clipboard(source: &ClipboardRef) -> Result<String, ClipboardError> {
    let source = Arc::clone(source);
    tokio::task::spawn_blocking(move || source.read_text())
        .await
        .map_err(|e| ClipboardError::Unavailable(format!("clipboard task failed: {e}")))?
}

/// Clipboard that is never available (headless sessions, tests).
pub struct NullClipboard;

impl ClipboardSource for NullClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        Err(ClipboardError::Unavailable("no clipboard".into()))
    }
}

impl ClipboardSink for NullClipboard {
    fn write_text(&self, _text: &str) -> Result<(), ClipboardError> {
        Err(ClipboardError::Unavailable("no clipboard".into()))
    }
}

/// Scripted clipboard for tests.
///
/// Returns queued results first, then the current value. Writes replace the
/// current value like a real clipboard would.
#[derive(Default)]
pub struct ScriptedClipboard {
    current: Mutex<Option<String>>,
    queued: Mutex<VecDeque<Result<String, ClipboardError>>>,
    reads: AtomicUsize,
}

impl ScriptedClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: &str) -> Self {
        let clipboard = Self::new();
        clipboard.set_text(text);
        clipboard
    }

    pub fn set_text(&self, text: &str) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(text.to_string());
        }
    }

    pub fn clear_text(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }

    /// Queue a one-off result for the next read.
    pub fn push_result(&self, result: Result<String, ClipboardError>) {
        if let Ok(mut queued) = self.queued.lock() {
            queued.push_back(result);
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ClipboardSource for ScriptedClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        if let Some(result) = self.queued.lock().ok().and_then(|mut q| q.pop_front()) {
            return result;
        }

        self.current
            .lock()
            .ok()
            .and_then(|c| c.clone())
            .filter(|s| !s.is_empty())
            .ok_or(ClipboardError::Empty)
    }
}

impl ClipboardSink for ScriptedClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        self.set_text(text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_clipboard_queue_then_current() {
        let clipboard = ScriptedClipboard::with_text("current");
        clipboard.push_result(Err(ClipboardError::PermissionDenied));

        assert_eq!(clipboard.read_text(), Err(ClipboardError::PermissionDenied));
        assert_eq!(clipboard.read_text(), Ok("current".to_string()));
        assert_eq!(clipboard.reads(), 2);
    }

    #[test]
    fn test_scripted_clipboard_empty() {
        let clipboard = ScriptedClipboard::new();
        assert_eq!(clipboard.read_text(), Err(ClipboardError::Empty));
        clipboard.set_text("");
        assert_eq!(clipboard.read_text(), Err(ClipboardError::Empty));
    }

    #[tokio::test]
    async fn test_read_clipboard_runs_source() {
        let source: ClipboardRef = Arc::new(ScriptedClipboard::with_text("hi"));
        assert_eq!(read_clipboard(&source).await, Ok("hi".to_string()));

        let null: ClipboardRef = Arc::new(NullClipboard);
        assert!(matches!(
            read_clipboard(&null).await,
            Err(ClipboardError::Unavailable(_))
        ));
    }
}
