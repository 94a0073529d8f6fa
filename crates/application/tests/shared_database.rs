//! Several connections to one history database, as when one-shot CLI commands
//! run next to the daemon.
//!
//! These run on real time: SQLite work happens on the blocking pool.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clipkeep_application::{open_database, Components, Daemon, Settings};
use clipkeep_badge::RecordingBadge;
use clipkeep_capture::ScriptedClipboard;
use clipkeep_events::InMemoryEventBus;
use clipkeep_history::{Entry, ManualClock};
use clipkeep_storage::{load_history, Database};
use clipkeep_writer::{WriterConfig, WriterCoordinator, WriterError, WriterHandle};

const NOW: i64 = 1_700_000_000_000;

fn settings_for(path: &Path) -> Settings {
    Settings {
        database_path: Some(path.to_path_buf()),
        poll_enabled: false,
        settle_delay_ms: 0,
        store_watch_interval_ms: 20,
        ..Settings::default()
    }
}

async fn start_daemon(
    settings: &Settings,
    badge: &Arc<RecordingBadge>,
) -> (Daemon, Arc<Database>) {
    let db = Arc::new(open_database(settings).unwrap());
    let clipboard = Arc::new(ScriptedClipboard::new());
    let mut daemon = Daemon::start(
        settings,
        Components {
            store: Arc::clone(&db) as _,
            clipboard: Arc::clone(&clipboard) as _,
            sink: clipboard,
            badge: Arc::clone(badge) as _,
            events: Arc::new(InMemoryEventBus::new()),
            clock: Arc::new(ManualClock::new(NOW)),
        },
    );
    daemon.watch_database(&db, settings.store_watch_interval());
    // Let the watcher take its first snapshot.
    tokio::time::sleep(Duration::from_millis(100)).await;
    (daemon, db)
}

fn second_writer(settings: &Settings) -> WriterHandle {
    let db = Arc::new(open_database(settings).unwrap());
    WriterCoordinator::spawn(db, settings.writer_config())
}

async fn wait_for(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(3);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn texts(entries: &[Entry]) -> Vec<&str> {
    entries.iter().map(|e| e.text.as_str()).collect()
}

// =============================================================================
// Change Propagation Tests
// =============================================================================

mod propagation {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_badge_follows_clear_from_another_connection() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_for(&dir.path().join("history.db"));
        let badge = Arc::new(RecordingBadge::new());
        let (daemon, _db) = start_daemon(&settings, &badge).await;

        daemon.history().add("a").await.unwrap();
        daemon.history().add("b").await.unwrap();
        wait_for("badge to show 2", || badge.last_count() == Some(2)).await;

        let cli = second_writer(&settings);
        let cleared = cli.clear().await.unwrap();
        assert!(cleared.changed);
        cli.shutdown().await;

        wait_for("badge to show 0", || badge.last_count() == Some(0)).await;
        assert!(daemon.history().entries().await.unwrap().is_empty());

        daemon.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_badge_follows_insert_from_another_connection() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_for(&dir.path().join("history.db"));
        let badge = Arc::new(RecordingBadge::new());
        let (daemon, _db) = start_daemon(&settings, &badge).await;
        wait_for("initial sync", || badge.last_count() == Some(0)).await;

        let cli = second_writer(&settings);
        cli.insert("from cli", NOW).await.unwrap();
        cli.shutdown().await;

        wait_for("badge to show 1", || badge.last_count() == Some(1)).await;

        daemon.shutdown().await;
    }
}

// =============================================================================
// Cross-Connection Ordering Tests
// =============================================================================

mod ordering {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_writers_on_two_connections_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_for(&dir.path().join("history.db"));
        let daemon_writer = second_writer(&settings);
        let cli_writer = second_writer(&settings);

        let tasks: Vec<_> = (0..30)
            .map(|i| {
                let writer = if i % 2 == 0 {
                    daemon_writer.clone()
                } else {
                    cli_writer.clone()
                };
                tokio::spawn(async move { writer.insert(format!("clip-{i}"), NOW + i).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let db = open_database(&settings).unwrap();
        let history = load_history(&db, 50).await.unwrap();
        assert_eq!(history.len(), 30, "every insert must survive: {history:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_clear_is_not_undone_by_a_pending_insert() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_for(&dir.path().join("history.db"));
        let daemon_writer = second_writer(&settings);
        let cli_writer = second_writer(&settings);

        daemon_writer.insert("old", NOW).await.unwrap();
        let (cleared, inserted) = tokio::join!(
            cli_writer.clear(),
            daemon_writer.insert("new", NOW + 1)
        );
        cleared.unwrap();
        inserted.unwrap();

        // Whichever committed last saw the other's result.
        let db = open_database(&settings).unwrap();
        let history = load_history(&db, 50).await.unwrap();
        assert!(!texts(&history).contains(&"old"), "cleared entry came back: {history:?}");
    }
}

// =============================================================================
// Lock Timeout Tests
// =============================================================================

mod lock_timeout {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_locked_database_times_out_and_does_not_commit_late() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let db = Arc::new(Database::open(&path).unwrap());
        let writer = WriterCoordinator::spawn(
            db,
            WriterConfig {
                io_timeout: Duration::from_millis(100),
                ..WriterConfig::default()
            },
        );

        let locker = rusqlite::Connection::open(&path).unwrap();
        locker.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let started = Instant::now();
        let result = writer.insert("while locked", NOW).await;
        let elapsed = started.elapsed();

        assert!(
            matches!(
                result,
                Err(WriterError::Timeout {
                    operation: "read",
                    ..
                })
            ),
            "unexpected result: {result:?}"
        );
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");

        locker.execute_batch("ROLLBACK").unwrap();

        let applied = writer.insert("after unlock", NOW + 1).await.unwrap();
        assert_eq!(texts(&applied.entries), ["after unlock"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_configured_timeout_bounds_lock_waits() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            io_timeout_ms: 100,
            ..settings_for(&dir.path().join("history.db"))
        };
        let writer = second_writer(&settings);

        let locker = rusqlite::Connection::open(settings.resolved_database_path()).unwrap();
        locker.execute_batch("BEGIN EXCLUSIVE").unwrap();

        let started = Instant::now();
        let result = writer.insert("while locked", NOW).await;
        let elapsed = started.elapsed();

        assert!(result.is_err());
        assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");

        locker.execute_batch("ROLLBACK").unwrap();
        assert!(writer.insert("after unlock", NOW + 1).await.unwrap().changed);
    }
}
