//! In-memory dedup cache of seen posts and seed pages
//!
//! Entries keep their insertion order for re-enqueueing and dumping. Two
//! indexes back the hot paths: post-level entries by dedup key for
//! membership tests, and every entry by URL for eviction of dead pages.

use std::collections::{BTreeMap, HashMap};

use crate::models::{CacheEntry, DedupKey};

/// Ordered, hash-indexed collection of [`CacheEntry`]
#[derive(Debug, Clone, Default)]
pub struct DedupCache {
    entries: BTreeMap<u64, CacheEntry>,
    keys: HashMap<DedupKey, u64>,
    by_url: HashMap<String, Vec<u64>>,
    next_seq: u64,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from entries in order, skipping duplicate post keys
    pub fn from_entries(entries: impl IntoIterator<Item = CacheEntry>) -> Self {
        let mut cache = Self::new();
        for entry in entries {
            cache.insert(entry);
        }
        cache
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a post with this key has been seen
    pub fn contains(&self, key: &DedupKey) -> bool {
        self.keys.contains_key(key)
    }

    /// Append an entry
    ///
    /// Returns `false` without inserting when a post-level entry with the
    /// same key already exists. Board-level entries are always appended.
    pub fn insert(&mut self, entry: CacheEntry) -> bool {
        let key = entry.key();
        if let Some(key) = &key {
            if self.keys.contains_key(key) {
                return false;
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        if let Some(key) = key {
            self.keys.insert(key, seq);
        }
        self.by_url.entry(entry.url.clone()).or_default().push(seq);
        self.entries.insert(seq, entry);
        true
    }

    /// Remove every entry whose stored URL equals `url`
    ///
    /// Returns the number of entries removed.
    pub fn remove_by_url(&mut self, url: &str) -> usize {
        let Some(seqs) = self.by_url.remove(url) else {
            return 0;
        };

        for seq in &seqs {
            if let Some(entry) = self.entries.remove(seq) {
                if let Some(key) = entry.key() {
                    self.keys.remove(&key);
                }
            }
        }

        seqs.len()
    }

    /// Distinct URLs in order of first appearance
    pub fn urls(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.entries
            .values()
            .filter(|entry| seen.insert(entry.url.as_str()))
            .map(|entry| entry.url.clone())
            .collect()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    /// Drop every board-level entry
    pub fn strip_board_level(&mut self) -> usize {
        let board_level: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_board_level())
            .map(|(seq, _)| *seq)
            .collect();

        for seq in &board_level {
            if let Some(entry) = self.entries.remove(seq) {
                if let Some(seqs) = self.by_url.get_mut(&entry.url) {
                    seqs.retain(|s| s != seq);
                    if seqs.is_empty() {
                        self.by_url.remove(&entry.url);
                    }
                }
            }
        }

        board_level.len()
    }

    /// Append the entries of `other` whose keys are not already present
    pub fn merge(&mut self, other: DedupCache) -> usize {
        other
            .entries
            .into_values()
            .filter(|entry| !entry.is_board_level())
            .map(|entry| self.insert(entry))
            .filter(|inserted| *inserted)
            .count()
    }

    /// Consume the cache, yielding entries in insertion order
    pub fn into_entries(self) -> Vec<CacheEntry> {
        self.entries.into_values().collect()
    }
}
