//! Clipboard history log for clipkeep.
//!
//! Pure domain logic: the `Entry` type, the retention policy and the four
//! mutations (`insert`, `expire`, `remove`, `clear`) that turn one snapshot of
//! the log into the next. Nothing in this crate performs I/O; persistence and
//! serialization of concurrent writers live in `clipkeep-storage` and
//! `clipkeep-writer`.
//!
//! Invariants held by every sequence these functions return:
//! - newest entry first
//! - no two entries share the same `text`
//! - at most `HistoryPolicy::max_entries` entries

mod clock;
mod entry;
mod log;
mod mutation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::Entry;
pub use log::{clear, expire, insert, remove, sanitize, HistoryPolicy};
pub use log::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
pub use mutation::Mutation;
