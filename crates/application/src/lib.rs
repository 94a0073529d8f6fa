mod daemon;
mod error;
mod history;
mod settings;

pub use daemon::{open_database, Components, Daemon};
pub use error::{AppError, Result, SettingsError};
pub use history::ClipboardHistory;
pub use settings::{default_database_path, default_settings_path, Settings};
