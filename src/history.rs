//! Recently watched URLs.
//!
//! Owned by whatever front end drives the proxy and passed around
//! explicitly. Most recent first, deduplicated by exact URL, capped at a
//! fixed length. Serialises as a bare JSON array so it can sit in any
//! string-valued local store.

use serde::{Deserialize, Serialize};

/// Entries kept when no capacity is given.
pub const DEFAULT_HISTORY_CAPACITY: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RecentHistory {
    entries: Vec<String>,
    #[serde(skip)]
    capacity: usize,
}

impl RecentHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Rebuild from stored entries, applying the same ordering rules as
    /// `record`. Earlier entries are treated as more recent.
    pub fn from_entries<I>(entries: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut history = Self::new(capacity);
        for url in entries {
            if history.entries.len() == capacity {
                break;
            }
            if !history.entries.contains(&url) {
                history.entries.push(url);
            }
        }
        history
    }

    /// Restore from the JSON array produced by `to_json`.
    pub fn from_json(json: &str, capacity: usize) -> Result<Self, serde_json::Error> {
        let entries: Vec<String> = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries, capacity))
    }

    pub fn to_json(&self) -> String {
        serde_json::Value::from(self.entries.clone()).to_string()
    }

    /// Move `url` to the front, dropping the oldest entry past capacity.
    pub fn record(&mut self, url: impl Into<String>) {
        let url = url.into();
        self.entries.retain(|existing| *existing != url);
        self.entries.insert(0, url);
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RecentHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl<'de> Deserialize<'de> for RecentHistory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let entries = Vec::<String>::deserialize(deserializer)?;
        Ok(Self::from_entries(entries, DEFAULT_HISTORY_CAPACITY))
    }
}
