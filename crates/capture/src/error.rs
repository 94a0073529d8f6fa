//! Error types for clipboard capture.

use clipkeep_writer::WriterError;
use thiserror::Error;

/// Clipboard could not provide text.
///
/// Never fatal: actors log it and wait for their next trigger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    /// The platform refused clipboard access.
    #[error("clipboard access denied - grant clipboard permission to clipkeep")]
    PermissionDenied,

    /// No clipboard is reachable (no display server, occupied, unsupported).
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),

    /// The clipboard holds no text.
    #[error("clipboard is empty")]
    Empty,
}

/// A capture attempt that did not produce a committed entry.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),

    #[error(transparent)]
    Writer(#[from] WriterError),
}
