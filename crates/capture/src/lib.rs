//! Capture actors for clipkeep.
//!
//! Three independent actors propose changes to the history, and all of them
//! submit through the single writer rather than touching the store:
//! - `EventCapture` reads the clipboard after a copy/shortcut/selection signal
//! - `ClipboardPoller` samples the clipboard on a fixed interval
//! - `ExpirySweeper` periodically submits an expiry with the current time
//!
//! Clipboard access goes through the `ClipboardSource` trait; `ArboardClipboard`
//! is the platform implementation.

mod error;
mod listener;
mod platform;
mod poller;
mod provider;
mod sweeper;

pub use error::{CaptureError, ClipboardError};
pub use listener::{
    trigger_channel, CaptureTrigger, EventCapture, TriggerSender, DEFAULT_SETTLE_DELAY,
};
pub use platform::ArboardClipboard;
pub use poller::{ClipboardPoller, PollOutcome, DEFAULT_POLL_INTERVAL};
pub use provider::{
    read_clipboard, ClipboardRef, ClipboardSink, ClipboardSource, NullClipboard,
    ScriptedClipboard,
};
pub use sweeper::{ExpirySweeper, DEFAULT_SWEEP_INTERVAL};
