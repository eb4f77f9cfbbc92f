//! Index - Inverted index for one indexer
//!
//! Maps index value → set of primary keys whose item currently produces that
//! value.
//!
//! # Example
//! ```ignore
//! // Indexer "namespace": which keys live in "kube-system"?
//! let keys = index.keys("kube-system");
//! // keys = ["kube-system/coredns", "kube-system/kube-proxy"]
//! ```
//!
//! # Design Notes
//! - A bucket exists only while it holds at least one key
//! - Deduplicates keys automatically

use std::collections::{HashMap, HashSet};

/// Inverted index for a single indexer
///
/// Provides O(1) lookup for value → keys mapping
#[derive(Debug, Default, Clone)]
pub struct Index {
    /// value → set of primary keys
    buckets: HashMap<String, HashSet<String>>,
}

impl Index {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// File `key` under `value`
    ///
    /// Returns `true` if the key was not already in that bucket.
    pub fn insert(&mut self, value: &str, key: &str) -> bool {
        match self.buckets.get_mut(value) {
            Some(bucket) => bucket.insert(key.to_string()),
            None => {
                let mut bucket = HashSet::new();
                bucket.insert(key.to_string());
                self.buckets.insert(value.to_string(), bucket);
                true
            }
        }
    }

    /// Remove `key` from the bucket for `value`
    ///
    /// The bucket itself is dropped once its last key is removed. Returns
    /// `true` if the key was present.
    pub fn remove(&mut self, value: &str, key: &str) -> bool {
        let Some(bucket) = self.buckets.get_mut(value) else {
            return false;
        };

        let removed = bucket.remove(key);
        if bucket.is_empty() {
            self.buckets.remove(value);
        }
        removed
    }

    /// The bucket for `value`, if any key is filed under it
    pub fn get(&self, value: &str) -> Option<&HashSet<String>> {
        self.buckets.get(value)
    }

    /// Keys filed under `value` (empty if none)
    pub fn keys(&self, value: &str) -> Vec<String> {
        self.buckets
            .get(value)
            .map(|bucket| bucket.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// All values that currently have a bucket
    pub fn values(&self) -> Vec<String> {
        self.buckets.keys().cloned().collect()
    }

    /// Check if any key is filed under `value`
    #[cfg(test)]
    pub(crate) fn contains_value(&self, value: &str) -> bool {
        self.buckets.contains_key(value)
    }

    /// Number of buckets
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Total number of key entries across all buckets
    pub fn entry_count(&self) -> usize {
        self.buckets.values().map(|b| b.len()).sum()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Iterate over `(value, keys)` pairs
    #[cfg(test)]
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &HashSet<String>)> {
        self.buckets.iter()
    }
}
