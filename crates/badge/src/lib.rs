//! Item-count badge for clipkeep.
//!
//! The badge is a projection of the persisted history: it never counts on its
//! own, it recomputes `len(history)` from the store at startup and from every
//! change notification afterwards.

mod display;
mod projector;

pub use display::{BadgeDisplay, BadgeError, LogBadge, RecordingBadge, StatusFileBadge};
pub use projector::{BadgeProjector, BadgeState, DEFAULT_BADGE_COLOR};
