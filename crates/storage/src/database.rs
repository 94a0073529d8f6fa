//! SQLite-backed store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::notify::{ChangeNotifier, ChangeStream};
use crate::{KeyValueStore, Result, StorageError, UpdateFn, Updated};

/// Key-value store persisted in a single SQLite table.
///
/// Values are stored as JSON text. Every statement runs on the blocking pool,
/// so a caller's timeout can give up on a locked database without stalling
/// the runtime.
pub struct Database {
    inner: Arc<Inner>,
}

struct Inner {
    conn: Mutex<Connection>,
    notifier: ChangeNotifier,
}

/// What the external change watcher last saw.
struct Snapshot {
    data_version: i64,
    rows: HashMap<String, String>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Self::from_connection(Connection::open(path)?)?;
        tracing::debug!(path = %path.display(), "database opened");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            inner: Arc::new(Inner {
                conn: Mutex::new(conn),
                notifier: ChangeNotifier::new(),
            }),
        })
    }

    /// How long a statement waits for another connection's lock.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.inner.conn()?.busy_timeout(timeout)?;
        Ok(())
    }

    /// Store raw text under `key`, bypassing JSON encoding.
    ///
    /// Only useful for reproducing damaged databases in tests.
    #[doc(hidden)]
    pub fn put_raw(&self, key: &str, raw: &str) -> Result<()> {
        let conn = self.inner.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO store (key, value) VALUES (?1, ?2)",
            (key, raw),
        )?;
        Ok(())
    }

    /// Announce commits made through other connections to the same file.
    ///
    /// SQLite's `data_version` is checked every `interval`; when another
    /// connection has committed, each key whose stored text changed is
    /// broadcast to this database's observers. Unreadable values are
    /// broadcast as `null`.
    pub fn watch_external_changes(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move {
            let mut snapshot = match run_blocking(&inner, Inner::snapshot).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot watch database for external changes");
                    return;
                }
            };
            tracing::debug!(interval_ms = interval.as_millis() as u64, "watching database for external changes");

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let polled = Arc::clone(&inner);
                let result = tokio::task::spawn_blocking(move || {
                    let changes = polled.external_changes(&mut snapshot);
                    (snapshot, changes)
                })
                .await;

                match result {
                    Ok((next, Ok(changes))) => {
                        snapshot = next;
                        for (key, value) in changes {
                            tracing::debug!(%key, "external change");
                            inner.notifier.notify(&key, value);
                        }
                    }
                    Ok((next, Err(e))) => {
                        snapshot = next;
                        tracing::warn!(error = %e, "external change check failed");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "external change watcher failed");
                        break;
                    }
                }
            }

            tracing::debug!("external change watcher stopped");
        })
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Inner) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking(&self.inner, f).await
    }
}

async fn run_blocking<T, F>(inner: &Arc<Inner>, f: F) -> Result<T>
where
    F: FnOnce(&Inner) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let inner = Arc::clone(inner);
    tokio::task::spawn_blocking(move || f(&inner))
        .await
        .map_err(|e| StorageError::Unavailable(format!("database task failed: {e}")))?
}

impl Inner {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("database mutex poisoned".into()))
    }

    fn read(&self, key: &str) -> Result<Option<Value>> {
        read_value(&*self.conn()?, key)
    }

    fn write(&self, key: &str, value: &Value) -> Result<()> {
        write_value(&*self.conn()?, key, value)
    }

    fn update(&self, key: &str, f: UpdateFn, abandoned: &AtomicBool) -> Result<Updated> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if abandoned.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("update abandoned by caller".into()));
        }

        let current = match read_value(&tx, key) {
            Ok(value) => value,
            Err(StorageError::Corrupt { key, source }) => {
                tracing::warn!(%key, error = %source, "replacing unreadable value");
                None
            }
            Err(e) => return Err(e),
        };

        let Some(next) = f(current.clone()) else {
            return Ok(Updated {
                value: current,
                written: false,
            });
        };

        write_value(&tx, key, &next)?;
        if abandoned.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("update abandoned by caller".into()));
        }
        tx.commit()?;

        Ok(Updated {
            value: Some(next),
            written: true,
        })
    }

    fn snapshot(&self) -> Result<Snapshot> {
        let conn = self.conn()?;
        Ok(Snapshot {
            data_version: data_version(&conn)?,
            rows: all_rows(&conn)?,
        })
    }

    fn external_changes(&self, snapshot: &mut Snapshot) -> Result<Vec<(String, Value)>> {
        let conn = self.conn()?;
        let version = data_version(&conn)?;
        if version == snapshot.data_version {
            return Ok(Vec::new());
        }
        let rows = all_rows(&conn)?;
        drop(conn);

        let changes = rows
            .iter()
            .filter(|(key, raw)| snapshot.rows.get(*key) != Some(*raw))
            .map(|(key, raw)| {
                let value = serde_json::from_str(raw).unwrap_or(Value::Null);
                (key.clone(), value)
            })
            .collect();

        snapshot.data_version = version;
        snapshot.rows = rows;
        Ok(changes)
    }
}

fn read_value(conn: &Connection, key: &str) -> Result<Option<Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM store WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;

    match raw {
        None => Ok(None),
        Some(json) => serde_json::from_str(&json)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            }),
    }
}

fn write_value(conn: &Connection, key: &str, value: &Value) -> Result<()> {
    let json = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO store (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, json),
    )?;
    Ok(())
}

/// Changes only when another connection commits.
fn data_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
}

fn all_rows(conn: &Connection) -> Result<HashMap<String, String>> {
    let mut stmt = conn.prepare("SELECT key, value FROM store")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<HashMap<String, String>, _>>()?;
    Ok(rows)
}

/// Marks an update as abandoned when the awaiting caller is dropped.
struct AbandonOnDrop(Arc<AtomicBool>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let key = key.to_string();
        self.blocking(move |inner| inner.read(&key)).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let owned_key = key.to_string();
        let written = value.clone();
        self.blocking(move |inner| inner.write(&owned_key, &written))
            .await?;
        self.inner.notifier.notify(key, value);
        Ok(())
    }

    /// Runs inside `BEGIN IMMEDIATE`, so no other connection commits between
    /// the read and the write. If the caller stops waiting (a timeout), the
    /// transaction is rolled back instead of committing late.
    async fn update(&self, key: &str, f: UpdateFn) -> Result<Updated> {
        let abandoned = Arc::new(AtomicBool::new(false));
        let _guard = AbandonOnDrop(Arc::clone(&abandoned));

        let owned_key = key.to_string();
        let updated = self
            .blocking(move |inner| inner.update(&owned_key, f, &abandoned))
            .await?;

        if updated.written {
            if let Some(value) = &updated.value {
                self.inner.notifier.notify(key, value.clone());
            }
        }
        Ok(updated)
    }

    fn on_change(&self, key: &str) -> ChangeStream {
        self.inner.notifier.subscribe(key)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
