//! Merge and retention rules for the history log.
//!
//! Every function takes an immutable snapshot and returns the next one. A
//! request that cannot apply (empty text, duplicate, unknown entry) returns
//! the input unchanged rather than an error.

use std::collections::HashSet;
use std::time::Duration;

use crate::entry::Entry;

/// Default capacity of the log.
pub const DEFAULT_MAX_ENTRIES: usize = 50;

/// Default maximum age of an entry (24 hours).
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Capacity and age bounds applied to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPolicy {
    pub max_entries: usize,
    pub ttl: Duration,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            ttl: DEFAULT_TTL,
        }
    }
}

/// Prepend `text` captured at `now`, then truncate to `max_entries`.
///
/// Returns `current` unchanged when `text` is empty or already present.
pub fn insert(current: &[Entry], text: &str, now: i64, max_entries: usize) -> Vec<Entry> {
    if text.is_empty() || current.iter().any(|e| e.text == text) {
        return current.to_vec();
    }

    let mut next = Vec::with_capacity((current.len() + 1).min(max_entries));
    next.push(Entry::new(text, now));
    next.extend(current.iter().cloned());
    next.truncate(max_entries);
    next
}

/// Drop every entry older than `ttl` at `now`, preserving survivor order.
pub fn expire(current: &[Entry], now: i64, ttl: Duration) -> Vec<Entry> {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    current
        .iter()
        .filter(|e| e.age_ms(now) <= ttl_ms)
        .cloned()
        .collect()
}

/// Drop the entry whose text is exactly `text`, if any.
pub fn remove(current: &[Entry], text: &str) -> Vec<Entry> {
    current.iter().filter(|e| e.text != text).cloned().collect()
}

/// The empty log.
pub fn clear() -> Vec<Entry> {
    Vec::new()
}

/// Restore the log invariants on a sequence of unknown provenance.
///
/// Drops empty texts, keeps the first (newest) occurrence of each text and
/// truncates to `max_entries`.
pub fn sanitize(entries: Vec<Entry>, max_entries: usize) -> Vec<Entry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| !e.text.is_empty())
        .filter(|e| seen.insert(e.text.clone()))
        .take(max_entries)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.text.as_str()).collect()
    }

    fn assert_invariants(entries: &[Entry], max_entries: usize) {
        let unique: HashSet<_> = entries.iter().map(|e| &e.text).collect();
        assert_eq!(unique.len(), entries.len(), "duplicate text in {entries:?}");
        assert!(entries.len() <= max_entries);
    }

    #[test]
    fn test_insert_evicts_oldest_beyond_cap() {
        let log = insert(&[], "a", 1, 2);
        assert_eq!(texts(&log), ["a"]);
        let log = insert(&log, "b", 2, 2);
        assert_eq!(texts(&log), ["b", "a"]);
        let log = insert(&log, "c", 3, 2);
        assert_eq!(texts(&log), ["c", "b"]);
    }

    #[test]
    fn test_insert_duplicate_is_noop() {
        let log = insert(&[], "a", 1, DEFAULT_MAX_ENTRIES);
        let again = insert(&log, "a", 2, DEFAULT_MAX_ENTRIES);
        assert_eq!(again, log);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].captured_at, 1);
    }

    #[test]
    fn test_insert_empty_is_noop() {
        let log = vec![Entry::new("a", 1)];
        assert_eq!(insert(&log, "", 2, DEFAULT_MAX_ENTRIES), log);
    }

    #[test]
    fn test_dedup_is_exact_match() {
        let mut log = insert(&[], "Hello", 1, DEFAULT_MAX_ENTRIES);
        log = insert(&log, "hello", 2, DEFAULT_MAX_ENTRIES);
        log = insert(&log, "hello ", 3, DEFAULT_MAX_ENTRIES);
        assert_eq!(texts(&log), ["hello ", "hello", "Hello"]);
    }

    #[test]
    fn test_insert_places_new_text_first_and_shifts_rest() {
        let log: Vec<Entry> = (0..5).map(|i| Entry::new(format!("t{i}"), i)).collect();
        let next = insert(&log, "new", 10, 5);
        assert_eq!(next[0], Entry::new("new", 10));
        assert_eq!(&next[1..], &log[..4]);

        let roomy = insert(&log, "new", 10, 50);
        assert_eq!(&roomy[1..], &log[..]);
    }

    #[test]
    fn test_insert_holds_invariants_over_many_inserts() {
        let mut log = Vec::new();
        for i in 0..200 {
            // Every third text repeats an earlier one.
            let text = format!("snippet-{}", if i % 3 == 0 { i / 3 } else { i });
            log = insert(&log, &text, i, 7);
            assert_invariants(&log, 7);
        }
    }

    #[test]
    fn test_expire_removes_entries_older_than_ttl() {
        let log = vec![Entry::new("x", 0)];
        assert!(expire(&log, 1_500, Duration::from_millis(1_000)).is_empty());
    }

    #[test]
    fn test_expire_keeps_entry_exactly_at_ttl() {
        let log = vec![Entry::new("x", 0)];
        assert_eq!(expire(&log, 1_000, Duration::from_millis(1_000)), log);
    }

    #[test]
    fn test_expire_preserves_order_of_survivors() {
        let log = vec![
            Entry::new("d", 900),
            Entry::new("c", 100),
            Entry::new("b", 800),
            Entry::new("a", 0),
        ];
        let next = expire(&log, 1_000, Duration::from_millis(500));
        assert_eq!(texts(&next), ["d", "b"]);
    }

    #[test]
    fn test_expire_is_idempotent() {
        let log: Vec<Entry> = (0..10).map(|i| Entry::new(format!("e{i}"), i * 100)).collect();
        let ttl = Duration::from_millis(450);
        let once = expire(&log, 1_000, ttl);
        let twice = expire(&once, 1_000, ttl);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let log = vec![Entry::new("b", 2), Entry::new("a", 1)];
        assert_eq!(remove(&log, "missing"), log);
    }

    #[test]
    fn test_remove_drops_matching_entry() {
        let log = vec![Entry::new("c", 3), Entry::new("b", 2), Entry::new("a", 1)];
        assert_eq!(texts(&remove(&log, "b")), ["c", "a"]);
    }

    #[test]
    fn test_clear_is_empty() {
        assert!(clear().is_empty());
    }

    #[test]
    fn test_sanitize_restores_invariants() {
        let raw = vec![
            Entry::new("b", 3),
            Entry::new("", 2),
            Entry::new("a", 2),
            Entry::new("b", 1),
            Entry::new("c", 0),
        ];
        let clean = sanitize(raw, 2);
        assert_eq!(clean, vec![Entry::new("b", 3), Entry::new("a", 2)]);
    }
}
