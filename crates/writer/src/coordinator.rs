//! The writer task and its handle.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clipkeep_history::{sanitize, Entry, HistoryPolicy, Mutation};
use clipkeep_storage::{decode_history, encode_history, StorageError, StoreRef, HISTORY_KEY};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Result, WriterError};
use crate::status::WriterStatus;

/// Default bound on a single store read or write.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Mutation function applied to the latest committed snapshot.
type MutationFn = Box<dyn FnOnce(&[Entry]) -> Vec<Entry> + Send + 'static>;

#[derive(Debug, Clone, Copy)]
pub struct WriterConfig {
    pub policy: HistoryPolicy,
    /// Maximum time a store read or write may take before the mutation fails.
    pub io_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            policy: HistoryPolicy::default(),
            io_timeout: DEFAULT_IO_TIMEOUT,
        }
    }
}

/// Outcome of a mutation that went through the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// The log after the mutation.
    pub entries: Vec<Entry>,
    /// False when the mutation was a no-op and nothing was written.
    pub changed: bool,
}

struct Request {
    label: &'static str,
    mutation: MutationFn,
    reply: oneshot::Sender<Result<Applied>>,
}

enum Command {
    Apply(Request),
    Shutdown(oneshot::Sender<()>),
}

/// Owns the history's read-modify-write cycle.
pub struct WriterCoordinator {
    store: StoreRef,
    config: WriterConfig,
    status: Arc<WriterStatus>,
}

impl WriterCoordinator {
    /// Spawn the writer task on the current tokio runtime.
    pub fn spawn(store: StoreRef, config: WriterConfig) -> WriterHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = Arc::new(WriterStatus::new());
        let coordinator = Self {
            store,
            config,
            status: Arc::clone(&status),
        };

        let task = tokio::spawn(coordinator.run(rx));

        WriterHandle {
            tx,
            policy: config.policy,
            status,
            task: Arc::new(std::sync::Mutex::new(Some(task))),
        }
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<Command>) {
        tracing::info!(
            max_entries = self.config.policy.max_entries,
            ttl_secs = self.config.policy.ttl.as_secs(),
            "history writer started"
        );

        let mut seq = 0u64;
        let mut shutdown_acks = Vec::new();

        while let Some(command) = rx.recv().await {
            match command {
                Command::Apply(request) => {
                    seq += 1;
                    self.handle(seq, request).await;
                }
                Command::Shutdown(ack) => {
                    // Stop accepting, but finish everything already queued.
                    rx.close();
                    shutdown_acks.push(ack);
                }
            }
        }

        for ack in shutdown_acks {
            let _ = ack.send(());
        }
        tracing::info!(applied = seq, "history writer stopped");
    }

    async fn handle(&self, seq: u64, request: Request) {
        let Request {
            label,
            mutation,
            reply,
        } = request;

        let result = self.commit(label, mutation).await;
        match &result {
            Ok(applied) if applied.changed => {
                self.status.record_committed();
                tracing::debug!(seq, mutation = label, len = applied.entries.len(), "history committed");
            }
            Ok(_) => {
                self.status.record_unchanged();
                tracing::trace!(seq, mutation = label, "history unchanged");
            }
            Err(e) => {
                self.status.record_failed();
                tracing::warn!(seq, mutation = label, error = %e, "history mutation failed");
            }
        }

        // The submitter may have stopped waiting; the commit stands either way.
        let _ = reply.send(result);
    }

    async fn commit(&self, label: &'static str, mutation: MutationFn) -> Result<Applied> {
        let timeout = self.config.io_timeout;
        let max_entries = self.config.policy.max_entries;

        let stage = Arc::new(Mutex::new(Stage::Reading));
        let update = {
            let stage = Arc::clone(&stage);
            Box::new(move |current: Option<Value>| {
                let (next, reached) = compute(current, mutation, max_entries);
                if let Ok(mut stage) = stage.lock() {
                    *stage = reached;
                }
                next
            })
        };

        let result = tokio::time::timeout(timeout, self.store.update(HISTORY_KEY, update)).await;
        let reached = stage
            .lock()
            .map(|mut stage| std::mem::replace(&mut *stage, Stage::Reading))
            .unwrap_or(Stage::Computed);

        match (result, reached) {
            (_, Stage::Panicked) => Err(WriterError::MutationPanicked { label }),
            (_, Stage::Unencodable(e)) => Err(WriterError::Write(e)),
            (Err(_), Stage::Reading) => Err(WriterError::Timeout {
                operation: "read",
                timeout,
            }),
            (Err(_), Stage::Computed) => Err(WriterError::Timeout {
                operation: "write",
                timeout,
            }),
            (Ok(Err(e)), Stage::Reading) => Err(WriterError::Read(e)),
            (Ok(Err(e)), Stage::Computed) => Err(WriterError::Write(e)),
            (Ok(Ok(updated)), _) => Ok(Applied {
                entries: decode_history(updated.value, max_entries),
                changed: updated.written,
            }),
        }
    }
}

/// How far a store update got through the mutation.
enum Stage {
    Reading,
    Computed,
    Panicked,
    Unencodable(StorageError),
}

/// Apply `mutation` to a stored value. `None` means nothing to write.
fn compute(current: Option<Value>, mutation: MutationFn, max_entries: usize) -> (Option<Value>, Stage) {
    let current = decode_history(current, max_entries);

    let next = match panic::catch_unwind(AssertUnwindSafe(|| mutation(&current))) {
        Ok(next) => sanitize(next, max_entries),
        Err(_) => return (None, Stage::Panicked),
    };
    if next == current {
        return (None, Stage::Computed);
    }

    match encode_history(&next) {
        Ok(value) => (Some(value), Stage::Computed),
        Err(e) => (None, Stage::Unencodable(e)),
    }
}

/// Cloneable submission handle for the writer task.
///
/// A request is queued at the moment the method is called, not when the
/// returned future is first polled, so call order is submission order even for
/// callers that await later.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::UnboundedSender<Command>,
    policy: HistoryPolicy,
    status: Arc<WriterStatus>,
    task: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl WriterHandle {
    /// Queue an arbitrary mutation of the latest committed log.
    ///
    /// The result is sanitised before being written, so `f` cannot break the
    /// log invariants. If `f` panics the request fails with
    /// `WriterError::MutationPanicked` and the writer keeps running.
    pub fn apply<F>(
        &self,
        label: &'static str,
        f: F,
    ) -> impl Future<Output = Result<Applied>> + Send + 'static
    where
        F: FnOnce(&[Entry]) -> Vec<Entry> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let queued = self
            .tx
            .send(Command::Apply(Request {
                label,
                mutation: Box::new(f),
                reply,
            }))
            .is_ok();

        async move {
            if !queued {
                return Err(WriterError::Closed);
            }
            rx.await.unwrap_or(Err(WriterError::Closed))
        }
    }

    /// Queue a `Mutation` evaluated under the writer's policy.
    pub fn submit(
        &self,
        mutation: Mutation,
    ) -> impl Future<Output = Result<Applied>> + Send + 'static {
        let policy = self.policy;
        self.apply(mutation.label(), move |current| {
            mutation.apply(current, &policy)
        })
    }

    pub fn insert(
        &self,
        text: impl Into<String>,
        at: i64,
    ) -> impl Future<Output = Result<Applied>> + Send + 'static {
        self.submit(Mutation::Insert {
            text: text.into(),
            at,
        })
    }

    pub fn expire(&self, now: i64) -> impl Future<Output = Result<Applied>> + Send + 'static {
        self.submit(Mutation::Expire { now })
    }

    pub fn remove(
        &self,
        text: impl Into<String>,
    ) -> impl Future<Output = Result<Applied>> + Send + 'static {
        self.submit(Mutation::Remove { text: text.into() })
    }

    pub fn clear(&self) -> impl Future<Output = Result<Applied>> + Send + 'static {
        self.submit(Mutation::Clear)
    }

    pub fn policy(&self) -> HistoryPolicy {
        self.policy
    }

    pub fn status(&self) -> &WriterStatus {
        &self.status
    }

    /// True while the writer task accepts requests.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Stop accepting new mutations, finish the queued ones and wait for the
    /// writer task to exit.
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Shutdown(ack)).is_ok() {
            let _ = done.await;
        }

        let task = self.task.lock().ok().and_then(|mut task| task.take());
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "history writer task ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for WriterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterHandle")
            .field("policy", &self.policy)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipkeep_storage::{MemoryStore, HISTORY_KEY};
    use serde_json::json;

    fn spawn_writer(store: Arc<MemoryStore>, max_entries: usize) -> WriterHandle {
        WriterCoordinator::spawn(
            store,
            WriterConfig {
                policy: HistoryPolicy {
                    max_entries,
                    ..HistoryPolicy::default()
                },
                ..WriterConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn test_cap_scenario() {
        let store = Arc::new(MemoryStore::new());
        let writer = spawn_writer(Arc::clone(&store), 2);

        writer.insert("a", 1).await.unwrap();
        writer.insert("b", 2).await.unwrap();
        let applied = writer.insert("c", 3).await.unwrap();

        assert_eq!(applied.entries, vec![Entry::new("c", 3), Entry::new("b", 2)]);
        assert_eq!(
            store.peek(HISTORY_KEY),
            Some(json!([{"text": "c", "timestamp": 3}, {"text": "b", "timestamp": 2}]))
        );
    }

    #[tokio::test]
    async fn test_duplicate_insert_skips_write() {
        let store = Arc::new(MemoryStore::new());
        let writer = spawn_writer(Arc::clone(&store), 50);

        let first = writer.insert("a", 1).await.unwrap();
        let second = writer.insert("a", 2).await.unwrap();

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(second.entries, vec![Entry::new("a", 1)]);
        assert_eq!(store.write_count(), 1);
        assert_eq!(writer.status().snapshot().unchanged, 1);
    }

    #[tokio::test]
    async fn test_custom_mutation_is_sanitised() {
        let store = Arc::new(MemoryStore::new());
        let writer = spawn_writer(Arc::clone(&store), 2);

        let applied = writer
            .apply("bulk", |_| {
                vec![
                    Entry::new("x", 3),
                    Entry::new("x", 2),
                    Entry::new("", 2),
                    Entry::new("y", 1),
                    Entry::new("z", 0),
                ]
            })
            .await
            .unwrap();

        assert_eq!(applied.entries, vec![Entry::new("x", 3), Entry::new("y", 1)]);
    }

    #[tokio::test]
    async fn test_panicking_mutation_fails_only_its_request() {
        let store = Arc::new(MemoryStore::new());
        let writer = spawn_writer(Arc::clone(&store), 50);
        writer.insert("before", 1).await.unwrap();

        let result = writer
            .apply("broken", |_| panic!("mutation bug"))
            .await;

        assert!(matches!(
            result,
            Err(WriterError::MutationPanicked { label: "broken" })
        ));
        assert!(writer.is_running());
        let after = writer.insert("after", 2).await.unwrap();
        assert_eq!(after.entries, vec![Entry::new("after", 2), Entry::new("before", 1)]);
        assert_eq!(writer.status().failed(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue_then_closes() {
        let store = Arc::new(MemoryStore::new());
        let writer = spawn_writer(Arc::clone(&store), 50);

        let pending = writer.insert("queued", 1);
        writer.shutdown().await;

        assert!(pending.await.unwrap().changed);
        assert!(!writer.is_running());
        assert!(matches!(
            writer.insert("late", 2).await,
            Err(WriterError::Closed)
        ));
    }
}
