//! Writer counters, updated without locks from the writer task.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct WriterStatus {
    committed: AtomicU64,
    unchanged: AtomicU64,
    failed: AtomicU64,
}

impl WriterStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutations that changed the log and were written.
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    /// Mutations that left the log as it was (no write issued).
    pub fn unchanged(&self) -> u64 {
        self.unchanged.load(Ordering::Relaxed)
    }

    /// Mutations that failed on read, write or timeout.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub(crate) fn record_committed(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unchanged(&self) {
        self.unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WriterStatusSnapshot {
        WriterStatusSnapshot {
            committed: self.committed(),
            unchanged: self.unchanged(),
            failed: self.failed(),
        }
    }
}

/// Snapshot of writer counters for serialization/display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct WriterStatusSnapshot {
    pub committed: u64,
    pub unchanged: u64,
    pub failed: u64,
}
