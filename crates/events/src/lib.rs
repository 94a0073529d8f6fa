//! Shared event contracts for clipkeep.
//!
//! These DTOs are what viewers and status surfaces receive. Using shared types
//! keeps producers and consumers agreeing on field names.
//!
//! Also provides the `EventBus` trait for decoupled event emission.

mod bus;

pub use bus::{
    emit_event, BroadcastEventBus, EmittedEvent, EventBus, EventBusRef, InMemoryEventBus,
    NullEventBus,
};

use serde::{Deserialize, Serialize};

/// Emitted after the history changed and the badge was recomputed.
///
/// Producers: badge projector
/// Consumers: viewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryChangedEvent {
    /// Number of entries in the log.
    pub count: usize,
    /// Timestamp in milliseconds since epoch.
    #[serde(default)]
    pub ts_ms: i64,
}

/// Emitted when a user-initiated capture could not read the clipboard.
///
/// Producers: viewer facade (`capture now`)
/// Consumers: viewers (non-blocking notification)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFailedEvent {
    /// Human-readable reason.
    pub reason: String,
    /// True when the platform denied clipboard access.
    #[serde(default)]
    pub permission_denied: bool,
}

/// Emitted when a mutation could not be committed.
///
/// Producers: viewer facade
/// Consumers: viewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationFailedEvent {
    /// Mutation label ("insert", "remove", ...).
    pub mutation: String,
    /// Error message.
    pub error: String,
}

/// Event names as constants to prevent typos.
pub mod event_names {
    /// History count changed.
    pub const HISTORY_CHANGED: &str = "history:changed";
    /// Explicit capture failed.
    pub const CAPTURE_FAILED: &str = "capture:failed";
    /// Mutation failed to commit.
    pub const MUTATION_FAILED: &str = "history:mutation_failed";
}
