//! Command line surface.
//!
//! `run` starts the daemon. Every other command is a one-shot viewer action
//! with its own writer. Its read-modify-write runs in one SQLite transaction,
//! so it cannot interleave with the daemon's, and the daemon picks the commit
//! up through its external change watcher.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clipkeep_application::{open_database, ClipboardHistory, Components, Daemon, Settings};
use clipkeep_badge::{BadgeDisplay, LogBadge, StatusFileBadge};
use clipkeep_capture::{ArboardClipboard, CaptureTrigger, TriggerSender};
use clipkeep_events::{event_names, BroadcastEventBus, EmittedEvent, NullEventBus};
use clipkeep_history::{Clock, Entry, SystemClock};
use clipkeep_writer::{Applied, WriterCoordinator, WriterHandle};
use tokio::sync::broadcast;

/// Characters of an entry shown by `list`.
const PREVIEW_CHARS: usize = 60;

#[derive(Parser)]
#[command(name = "clipkeep", version, about = "Clipboard history that stays consistent")]
pub struct Cli {
    /// Settings file (defaults to <config_dir>/clipkeep/settings.json)
    #[arg(long, global = true, env = "CLIPKEEP_CONFIG")]
    pub config: Option<PathBuf>,

    /// History database, overriding the settings file
    #[arg(long, global = true, env = "CLIPKEEP_DATABASE")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the capture daemon until interrupted
    Run,
    /// Show the history, newest first
    List {
        #[arg(long)]
        json: bool,
        /// Only entries containing this text, ignoring case
        #[arg(long, short)]
        search: Option<String>,
    },
    /// Add text as if it had just been copied
    Add { text: String },
    /// Capture the current clipboard contents
    Capture,
    /// Put text back on the clipboard
    Copy { text: String },
    /// Remove an entry by its exact text
    Remove { text: String },
    /// Remove every entry
    Clear,
    /// Print the number of entries
    Count,
}

pub async fn run(settings: Settings) -> Result<()> {
    let store = Arc::new(open_database(&settings)?);

    let badge: Arc<dyn BadgeDisplay> = match &settings.status_file {
        Some(path) => Arc::new(
            StatusFileBadge::new(path)
                .with_context(|| format!("cannot use status file {}", path.display()))?,
        ),
        None => Arc::new(LogBadge),
    };
    let clipboard = Arc::new(ArboardClipboard::new());
    let events = BroadcastEventBus::default();
    let event_log = tokio::spawn(log_events(events.subscribe()));

    let mut daemon = Daemon::start(
        &settings,
        Components {
            store: Arc::clone(&store) as _,
            clipboard: Arc::clone(&clipboard) as _,
            sink: clipboard,
            badge,
            events: Arc::new(events),
            clock: Arc::new(SystemClock),
        },
    );
    daemon.watch_database(&store, settings.store_watch_interval());

    let waited = wait_for_shutdown(daemon.triggers()).await;
    tracing::info!("shutting down");
    daemon.shutdown().await;
    // The bus closes once the daemon's last handle to it is gone.
    if let Err(e) = event_log.await {
        tracing::warn!(error = %e, "event log ended abnormally");
    }
    waited
}

/// Log every event the daemon publishes until the bus closes.
async fn log_events(mut events: broadcast::Receiver<EmittedEvent>) -> usize {
    let mut seen = 0;
    loop {
        match events.recv().await {
            Ok(event) => {
                seen += 1;
                if event.topic == event_names::HISTORY_CHANGED {
                    tracing::debug!(topic = %event.topic, payload = %event.payload, "event");
                } else {
                    tracing::warn!(topic = %event.topic, payload = %event.payload, "event");
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => return seen,
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown(triggers: TriggerSender) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut copy_signal = signal(SignalKind::user_defined1()).context("cannot watch SIGUSR1")?;
    tracing::info!("send SIGUSR1 after a copy to capture immediately");

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => return result.context("cannot watch Ctrl-C"),
            _ = copy_signal.recv() => {
                if let Err(e) = triggers.try_send(CaptureTrigger::Copy) {
                    tracing::warn!(error = %e, "copy signal dropped");
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_triggers: TriggerSender) -> Result<()> {
    tokio::signal::ctrl_c().await.context("cannot watch Ctrl-C")
}

pub async fn list(settings: Settings, json: bool, search: Option<&str>) -> Result<()> {
    let (history, writer) = open_history(&settings)?;
    let entries = history.entries().await;
    writer.shutdown().await;
    let entries = filter_entries(entries?, search);

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", if search.is_some() { "(no matches)" } else { "(empty)" });
        return Ok(());
    }

    let now = SystemClock.now_ms();
    for (index, entry) in entries.iter().enumerate() {
        println!("{:>3}  {:>6}  {}", index + 1, format_age(entry, now), preview(&entry.text));
    }
    Ok(())
}

pub async fn add(settings: Settings, text: &str) -> Result<()> {
    let (history, writer) = open_history(&settings)?;
    let applied = history.add(text).await;
    writer.shutdown().await;
    report(applied?);
    Ok(())
}

pub async fn capture(settings: Settings) -> Result<()> {
    let (history, writer) = open_history(&settings)?;
    let applied = history.capture_now().await;
    writer.shutdown().await;
    report(applied.context("nothing captured")?);
    Ok(())
}

pub async fn copy(settings: Settings, text: &str) -> Result<()> {
    let (history, writer) = open_history(&settings)?;
    let copied = history.copy(text).await;
    writer.shutdown().await;
    copied?;
    println!("copied");
    Ok(())
}

pub async fn remove(settings: Settings, text: &str) -> Result<()> {
    let (history, writer) = open_history(&settings)?;
    let applied = history.remove(text).await;
    writer.shutdown().await;
    let applied = applied?;
    if !applied.changed {
        println!("no entry matched");
    }
    report(applied);
    Ok(())
}

pub async fn clear(settings: Settings) -> Result<()> {
    let (history, writer) = open_history(&settings)?;
    let applied = history.clear().await;
    writer.shutdown().await;
    report(applied?);
    Ok(())
}

pub async fn count(settings: Settings) -> Result<()> {
    let (history, writer) = open_history(&settings)?;
    let count = history.count().await;
    writer.shutdown().await;
    println!("{}", count?);
    Ok(())
}

fn open_history(settings: &Settings) -> Result<(ClipboardHistory, WriterHandle)> {
    let store = Arc::new(open_database(settings)?);
    let writer = WriterCoordinator::spawn(Arc::clone(&store) as _, settings.writer_config());
    let clipboard = Arc::new(ArboardClipboard::new());

    let history = ClipboardHistory::new(
        store,
        writer.clone(),
        Arc::clone(&clipboard) as _,
        clipboard,
        Arc::new(NullEventBus),
        Arc::new(SystemClock),
    );
    Ok((history, writer))
}

/// Case-insensitive substring filter.
fn filter_entries(entries: Vec<Entry>, search: Option<&str>) -> Vec<Entry> {
    let Some(query) = search.map(str::to_lowercase) else {
        return entries;
    };
    entries
        .into_iter()
        .filter(|entry| entry.text.to_lowercase().contains(&query))
        .collect()
}

fn report(applied: Applied) {
    println!("{} entries", applied.entries.len());
}

fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    let mut shown: String = line.chars().take(PREVIEW_CHARS).collect();
    if line.chars().count() > PREVIEW_CHARS || text.lines().nth(1).is_some() {
        shown.push('…');
    }
    shown
}

fn format_age(entry: &Entry, now: i64) -> String {
    let secs = entry.age_ms(now) / 1_000;
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3_600 => format!("{}m", s / 60),
        s => format!("{}h", s / 3_600),
    }
}
