//! Single logical writer for the clipboard history.
//!
//! Two actors that each read the log, modify it and write it back can silently
//! overwrite each other. Every mutation is therefore sent to one task that owns
//! the read → compute → write cycle and processes requests strictly in the
//! order they were submitted. Each cycle is a single `KeyValueStore::update`,
//! which the SQLite store makes atomic against writers in other processes.
//!
//! ```text
//!  poller ─┐
//!  capture ├─► WriterHandle ──(FIFO mpsc)──► writer task ──► KeyValueStore
//!  sweeper ┤                                    │
//!  viewer ─┘  ◄────────── oneshot reply ────────┘
//! ```

mod coordinator;
mod error;
mod status;

pub use coordinator::{
    Applied, WriterConfig, WriterCoordinator, WriterHandle, DEFAULT_IO_TIMEOUT,
};
pub use error::{Result, WriterError};
pub use status::{WriterStatus, WriterStatusSnapshot};
