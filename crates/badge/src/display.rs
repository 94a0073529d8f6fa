//! Badge outputs.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

/// Write-only badge surface.
///
/// Calls are fire-and-forget; implementations log their own failures.
pub trait BadgeDisplay: Send + Sync {
    fn set_count(&self, count: usize);
    fn set_color(&self, token: &str);
}

#[derive(Debug, thiserror::Error)]
pub enum BadgeError {
    #[error("badge file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Badge that only logs.
pub struct LogBadge;

impl BadgeDisplay for LogBadge {
    fn set_count(&self, count: usize) {
        tracing::info!(count, "badge");
    }

    fn set_color(&self, token: &str) {
        tracing::debug!(color = token, "badge color");
    }
}

/// Badge written as JSON to a file, for status bars that poll a file
/// (waybar/polybar custom modules).
///
/// ```json
/// {"text":"3","tooltip":"3 clipboard entries","class":"#4B5563"}
/// ```
pub struct StatusFileBadge {
    path: PathBuf,
    state: Mutex<StatusLine>,
}

#[derive(Debug, Clone, Default, Serialize)]
struct StatusLine {
    text: String,
    tooltip: String,
    class: String,
}

impl StatusFileBadge {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, BadgeError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            state: Mutex::new(StatusLine::default()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(&self, f: impl FnOnce(&mut StatusLine)) {
        let line = match self.state.lock() {
            Ok(mut state) => {
                f(&mut state);
                state.clone()
            }
            Err(_) => return,
        };
        if let Err(e) = write_atomically(&self.path, &line) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write badge file");
        }
    }
}

impl BadgeDisplay for StatusFileBadge {
    fn set_count(&self, count: usize) {
        self.update(|line| {
            line.text = count.to_string();
            line.tooltip = match count {
                1 => "1 clipboard entry".to_string(),
                n => format!("{n} clipboard entries"),
            };
        });
    }

    fn set_color(&self, token: &str) {
        self.update(|line| line.class = token.to_string());
    }
}

fn write_atomically(path: &Path, line: &StatusLine) -> Result<(), BadgeError> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp)?;
        serde_json::to_writer(&mut file, line).map_err(std::io::Error::from)?;
        file.write_all(b"\n")?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Badge that remembers every call, for tests.
#[derive(Debug, Default)]
pub struct RecordingBadge {
    counts: Mutex<Vec<usize>>,
    colors: Mutex<Vec<String>>,
}

impl RecordingBadge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> Vec<usize> {
        self.counts.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn colors(&self) -> Vec<String> {
        self.colors.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn last_count(&self) -> Option<usize> {
        self.counts().last().copied()
    }
}

impl BadgeDisplay for RecordingBadge {
    fn set_count(&self, count: usize) {
        if let Ok(mut counts) = self.counts.lock() {
            counts.push(count);
        }
    }

    fn set_color(&self, token: &str) {
        if let Ok(mut colors) = self.colors.lock() {
            colors.push(token.to_string());
        }
    }
}
