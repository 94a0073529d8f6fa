//! Change notification fan-out.

use serde_json::Value;
use tokio::sync::broadcast;

/// Notifications buffered per observer before it is reported as lagging.
const CHANNEL_CAPACITY: usize = 64;

/// A committed write.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub key: String,
    pub value: Value,
}

/// What an observer sees on its change stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeSignal {
    /// A write to the watched key committed.
    Changed(StoreChange),
    /// The observer fell behind and `n` notifications were discarded; re-read
    /// the store instead of relying on the stream.
    Lagged(u64),
}

/// Broadcasts committed writes to every subscriber.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<StoreChange>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce a committed write. No subscribers is not an error.
    pub fn notify(&self, key: &str, value: Value) {
        let receivers = self
            .tx
            .send(StoreChange {
                key: key.to_string(),
                value,
            })
            .unwrap_or(0);
        tracing::trace!(key, receivers, "store change broadcast");
    }

    pub fn subscribe(&self, key: &str) -> ChangeStream {
        ChangeStream {
            key: key.to_string(),
            rx: self.tx.subscribe(),
        }
    }
}

/// Stream of changes to a single key.
pub struct ChangeStream {
    key: String,
    rx: broadcast::Receiver<StoreChange>,
}

impl ChangeStream {
    /// Key this stream watches.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait for the next change to the watched key.
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn next(&mut self) -> Option<ChangeSignal> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.key == self.key => {
                    return Some(ChangeSignal::Changed(change));
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(key = %self.key, skipped = n, "change stream lagged");
                    return Some(ChangeSignal::Lagged(n));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl std::fmt::Debug for ChangeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeStream").field("key", &self.key).finish()
    }
}
