//! Platform clipboard via arboard.

use crate::error::ClipboardError;
use crate::provider::{ClipboardSink, ClipboardSource};

/// ClipboardSource/ClipboardSink implementation using arboard.
///
/// A fresh `arboard::Clipboard` is opened per call; holding one open keeps a
/// display-server connection alive for the life of the process.
pub struct ArboardClipboard;

impl ArboardClipboard {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ArboardClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipboardSource for ArboardClipboard {
    fn read_text(&self) -> Result<String, ClipboardError> {
        let mut clipboard = arboard::Clipboard::new().map_err(map_error)?;
        let text = clipboard.get_text().map_err(map_error)?;
        if text.is_empty() {
            return Err(ClipboardError::Empty);
        }
        Ok(text)
    }
}

impl ClipboardSink for ArboardClipboard {
    fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard = arboard::Clipboard::new().map_err(map_error)?;
        clipboard.set_text(text.to_string()).map_err(map_error)
    }
}

fn map_error(e: arboard::Error) -> ClipboardError {
    match e {
        arboard::Error::ContentNotAvailable => ClipboardError::Empty,
        arboard::Error::Unknown { description } if is_permission_error(&description) => {
            ClipboardError::PermissionDenied
        }
        other => ClipboardError::Unavailable(other.to_string()),
    }
}

fn is_permission_error(description: &str) -> bool {
    let lower = description.to_lowercase();
    lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_error() {
        assert_eq!(
            map_error(arboard::Error::ContentNotAvailable),
            ClipboardError::Empty
        );
        assert_eq!(
            map_error(arboard::Error::Unknown {
                description: "Permission denied by sandbox".into()
            }),
            ClipboardError::PermissionDenied
        );
        assert!(matches!(
            map_error(arboard::Error::ClipboardNotSupported),
            ClipboardError::Unavailable(_)
        ));
    }
}
