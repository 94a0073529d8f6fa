use serde::{Deserialize, Serialize};

/// One captured text snippet.
///
/// Identity is the exact `text` value; two entries with the same text are
/// duplicates regardless of when they were captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub text: String,
    /// Capture time in milliseconds since the Unix epoch.
    #[serde(rename = "timestamp")]
    pub captured_at: i64,
}

impl Entry {
    pub fn new(text: impl Into<String>, captured_at: i64) -> Self {
        Self {
            text: text.into(),
            captured_at,
        }
    }

    /// Age of the entry relative to `now_ms`, clamped at zero for entries
    /// stamped in the future (clock skew between sessions).
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.captured_at).max(0)
    }
}
