//! Mutation requests accepted by the single logical writer.

use std::fmt;

use crate::entry::Entry;
use crate::log::{self, HistoryPolicy};

/// One logical change to the history log.
///
/// Every variant is safe to deliver late or twice: inserting existing text or
/// expiring with nothing expired leaves the log as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Insert { text: String, at: i64 },
    Expire { now: i64 },
    Remove { text: String },
    Clear,
}

impl Mutation {
    /// Compute the next snapshot from `current`.
    pub fn apply(&self, current: &[Entry], policy: &HistoryPolicy) -> Vec<Entry> {
        match self {
            Mutation::Insert { text, at } => log::insert(current, text, *at, policy.max_entries),
            Mutation::Expire { now } => log::expire(current, *now, policy.ttl),
            Mutation::Remove { text } => log::remove(current, text),
            Mutation::Clear => log::clear(),
        }
    }

    /// Short name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Mutation::Insert { .. } => "insert",
            Mutation::Expire { .. } => "expire",
            Mutation::Remove { .. } => "remove",
            Mutation::Clear => "clear",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mutation::Insert { text, at } => write!(f, "insert({} chars @ {at})", text.chars().count()),
            Mutation::Expire { now } => write!(f, "expire(@ {now})"),
            Mutation::Remove { text } => write!(f, "remove({} chars)", text.chars().count()),
            Mutation::Clear => write!(f, "clear"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_sequential_fold() {
        let policy = HistoryPolicy {
            max_entries: 3,
            ttl: Duration::from_millis(1_000),
        };
        let mutations = [
            Mutation::Insert { text: "a".into(), at: 0 },
            Mutation::Insert { text: "b".into(), at: 600 },
            Mutation::Insert { text: "a".into(), at: 700 },
            Mutation::Expire { now: 1_200 },
            Mutation::Insert { text: "c".into(), at: 1_300 },
            Mutation::Remove { text: "b".into() },
        ];

        let log = mutations
            .iter()
            .fold(Vec::new(), |log, m| m.apply(&log, &policy));

        assert_eq!(log, vec![Entry::new("c", 1_300)]);
    }

    #[test]
    fn test_clear_discards_everything() {
        let log = vec![Entry::new("a", 1)];
        assert!(Mutation::Clear.apply(&log, &HistoryPolicy::default()).is_empty());
    }

    #[test]
    fn test_display_hides_text() {
        let m = Mutation::Insert {
            text: "secret".into(),
            at: 5,
        };
        assert_eq!(m.to_string(), "insert(6 chars @ 5)");
        assert_eq!(m.label(), "insert");
    }
}
