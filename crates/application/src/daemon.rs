//! Wires the writer, capture actors and badge projector together.

use std::sync::Arc;
use std::time::Duration;

use clipkeep_badge::{BadgeDisplay, BadgeProjector};
use clipkeep_capture::{
    trigger_channel, ClipboardPoller, ClipboardRef, ClipboardSink, EventCapture, ExpirySweeper,
    TriggerSender,
};
use clipkeep_events::EventBusRef;
use clipkeep_history::Clock;
use clipkeep_storage::{Database, StoreRef};
use clipkeep_writer::{WriterCoordinator, WriterHandle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::history::ClipboardHistory;
use crate::settings::Settings;

/// Pending copy signals kept before new ones are dropped.
const TRIGGER_CAPACITY: usize = 16;

/// External collaborators the daemon runs against.
#[derive(Clone)]
pub struct Components {
    pub store: StoreRef,
    pub clipboard: ClipboardRef,
    pub sink: Arc<dyn ClipboardSink>,
    pub badge: Arc<dyn BadgeDisplay>,
    pub events: EventBusRef,
    pub clock: Arc<dyn Clock>,
}

/// Open (creating if needed) the configured history database.
///
/// Waits for another process's lock are bounded by the I/O timeout.
pub fn open_database(settings: &Settings) -> Result<Database> {
    let path = settings.resolved_database_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| AppError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let db = Database::open(&path)?;
    db.set_busy_timeout(settings.io_timeout())?;
    tracing::info!("Database initialized at {:?}", path);
    Ok(db)
}

/// A running clipkeep instance.
pub struct Daemon {
    writer: WriterHandle,
    history: ClipboardHistory,
    triggers: TriggerSender,
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Daemon {
    /// Start every actor on the current tokio runtime.
    pub fn start(settings: &Settings, components: Components) -> Self {
        let Components {
            store,
            clipboard,
            sink,
            badge,
            events,
            clock,
        } = components;

        let cancel = CancellationToken::new();
        let writer = WriterCoordinator::spawn(Arc::clone(&store), settings.writer_config());
        let mut tasks = Vec::new();

        let projector = BadgeProjector::new(Arc::clone(&store), badge, settings.max_entries)
            .with_color(settings.badge_color.clone())
            .with_event_bus(Arc::clone(&events));
        tasks.push(("badge", projector.spawn(cancel.child_token())));

        let sweeper = ExpirySweeper::new(writer.clone(), Arc::clone(&clock))
            .with_interval(settings.sweep_interval());
        tasks.push(("sweeper", sweeper.spawn(cancel.child_token())));

        if settings.poll_enabled {
            let poller =
                ClipboardPoller::new(Arc::clone(&clipboard), writer.clone(), Arc::clone(&clock))
                    .with_interval(settings.poll_interval());
            tasks.push(("poller", poller.spawn(cancel.child_token())));
        } else {
            tracing::info!("clipboard polling disabled");
        }

        let (triggers, trigger_rx) = trigger_channel(TRIGGER_CAPACITY);
        let capture = EventCapture::new(Arc::clone(&clipboard), writer.clone(), Arc::clone(&clock))
            .with_settle_delay(settings.settle_delay());
        tasks.push(("capture", capture.spawn(trigger_rx, cancel.child_token())));

        let history = ClipboardHistory::new(store, writer.clone(), clipboard, sink, events, clock);

        tracing::info!(actors = tasks.len(), "clipkeep started");

        Self {
            writer,
            history,
            triggers,
            cancel,
            tasks,
        }
    }

    /// Sender for copy/shortcut/selection signals.
    pub fn triggers(&self) -> TriggerSender {
        self.triggers.clone()
    }

    pub fn history(&self) -> &ClipboardHistory {
        &self.history
    }

    pub fn writer(&self) -> &WriterHandle {
        &self.writer
    }

    /// Forward commits made to `db` by other processes (one-shot CLI
    /// commands, a second viewer) to this daemon's observers.
    pub fn watch_database(&mut self, db: &Database, interval: Duration) {
        let watcher = db.watch_external_changes(interval, self.cancel.child_token());
        self.tasks.push(("store-watch", watcher));
    }

    /// Stop all actors, then let the writer finish queued mutations.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(actor = name, error = %e, "actor ended abnormally");
            }
        }

        self.writer.shutdown().await;
        let status = self.writer.status().snapshot();
        tracing::info!(
            committed = status.committed,
            unchanged = status.unchanged,
            failed = status.failed,
            "clipkeep stopped"
        );
    }
}
