use std::time::Duration;

use clipkeep_storage::StorageError;

/// Why a mutation was not applied.
///
/// In every case the persisted log is left at its last committed state and the
/// caller may resubmit.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("failed to read history: {0}")]
    Read(#[source] StorageError),

    #[error("failed to write history: {0}")]
    Write(#[source] StorageError),

    #[error("history {operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("history mutation {label} panicked")]
    MutationPanicked { label: &'static str },

    #[error("history writer is not running")]
    Closed,
}

pub type Result<T> = std::result::Result<T, WriterError>;
