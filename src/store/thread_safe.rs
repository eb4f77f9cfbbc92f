//! Thread-safe indexed store
//!
//! A keyed table of items plus one inverted [`Index`] per registered indexer.
//!
//! - Mutations (`add`, `update`, `delete`, `replace`, `add_indexers`) take the
//!   write lock for their whole duration
//! - Reads take the read lock and copy data out before returning
//!
//! Every caller-supplied index function is evaluated before the table or any
//! index is touched, so a failing (or panicking) indexer leaves the store
//! exactly as it was.

use crate::store::error::{ExtractError, StoreError, StoreResult};
use crate::store::index::Index;
use crate::store::indexer::{value_set, Indexers};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Indexer name → values an item was filed under
type IndexTerms = HashMap<String, HashSet<String>>;

/// A stored item together with the index values it was filed under
struct Entry<T> {
    item: T,
    terms: IndexTerms,
}

struct StoreState<T> {
    items: HashMap<String, Entry<T>>,
    indexers: Indexers<T>,
    indices: HashMap<String, Index>,
    resource_version: Option<String>,
    last_replaced_at: Option<DateTime<Utc>>,
}

impl<T> StoreState<T> {
    /// Evaluate every registered indexer on `item`
    fn compute_terms(&self, key: &str, item: &T) -> StoreResult<IndexTerms> {
        let mut terms = HashMap::with_capacity(self.indexers.len());

        for (name, indexer) in &self.indexers {
            let values =
                value_set(indexer.as_ref(), item).map_err(|source| StoreError::IndexFunction {
                    indexer: name.clone(),
                    key: key.to_string(),
                    source,
                })?;

            if !values.is_empty() {
                terms.insert(name.clone(), values);
            }
        }

        Ok(terms)
    }

    fn empty_indices(&self) -> HashMap<String, Index> {
        self.indexers
            .keys()
            .map(|name| (name.clone(), Index::new()))
            .collect()
    }
}

/// Move `key` from its `old` index values to its `new` ones
///
/// Buckets for values present in both sets are left untouched.
fn update_indices(
    indices: &mut HashMap<String, Index>,
    key: &str,
    old: Option<&IndexTerms>,
    new: &IndexTerms,
) {
    let none = HashSet::new();

    if let Some(old) = old {
        for (name, old_values) in old {
            let new_values = new.get(name).unwrap_or(&none);
            if let Some(index) = indices.get_mut(name) {
                for value in old_values.difference(new_values) {
                    index.remove(value, key);
                }
            }
        }
    }

    for (name, new_values) in new {
        let old_values = old.and_then(|o| o.get(name)).unwrap_or(&none);
        if let Some(index) = indices.get_mut(name) {
            for value in new_values.difference(old_values) {
                index.insert(value, key);
            }
        }
    }
}

/// Concurrency-safe keyed table with pluggable secondary indices
///
/// Items are handed out as clones; nothing returned by a read aliases the
/// store's own copy.
pub struct ThreadSafeStore<T> {
    state: RwLock<StoreState<T>>,
}

impl<T> ThreadSafeStore<T> {
    /// Create an empty store with an initial indexer set
    pub fn new(indexers: Indexers<T>) -> Self {
        Self::with_capacity(indexers, 0)
    }

    /// Create an empty store with room for `capacity` items
    pub fn with_capacity(indexers: Indexers<T>, capacity: usize) -> Self {
        let indices = indexers
            .keys()
            .map(|name| (name.clone(), Index::new()))
            .collect();

        Self {
            state: RwLock::new(StoreState {
                items: HashMap::with_capacity(capacity),
                indexers,
                indices,
                resource_version: None,
                last_replaced_at: None,
            }),
        }
    }

    // The state is only written after every index function has returned, so
    // a panic inside one cannot leave a half-applied mutation behind.
    fn read_state(&self) -> RwLockReadGuard<'_, StoreState<T>> {
        self.state.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Store lock poisoned by a panicking caller, recovering");
            poisoned.into_inner()
        })
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState<T>> {
        self.state.write().unwrap_or_else(|poisoned| {
            tracing::warn!("Store lock poisoned by a panicking caller, recovering");
            poisoned.into_inner()
        })
    }

    // ==================== Mutation Methods ====================

    /// Insert or overwrite the item at `key`
    ///
    /// Recomputes the key's membership in every index. If any indexer fails
    /// on `item` nothing is stored and the error is returned.
    pub fn add(&self, key: impl Into<String>, item: T) -> StoreResult<()> {
        let key = key.into();
        let mut guard = self.write_state();
        let state = &mut *guard;

        let terms = state.compute_terms(&key, &item)?;
        let old = state.items.remove(&key);
        update_indices(&mut state.indices, &key, old.as_ref().map(|e| &e.terms), &terms);
        state.items.insert(key, Entry { item, terms });

        Ok(())
    }

    /// Same as [`add`](Self::add)
    pub fn update(&self, key: impl Into<String>, item: T) -> StoreResult<()> {
        self.add(key, item)
    }

    /// Remove the item at `key` from the table and from every index
    ///
    /// Returns the removed item, or `None` if the key was absent.
    pub fn delete(&self, key: &str) -> Option<T> {
        let mut guard = self.write_state();
        let state = &mut *guard;

        let entry = state.items.remove(key)?;
        for (name, values) in &entry.terms {
            if let Some(index) = state.indices.get_mut(name) {
                for value in values {
                    index.remove(value, key);
                }
            }
        }

        Some(entry.item)
    }

    /// Atomically swap the whole contents of the store
    ///
    /// Every index is rebuilt from scratch. If an indexer fails on any of the
    /// supplied items, the previous contents are kept and the error returned.
    /// `resource_version` is recorded for observers and not interpreted.
    pub fn replace<I>(&self, items: I, resource_version: impl Into<String>) -> StoreResult<()>
    where
        I: IntoIterator<Item = (String, T)>,
    {
        let resource_version = resource_version.into();
        let mut guard = self.write_state();
        let state = &mut *guard;

        let items = items.into_iter();
        let mut entries = HashMap::with_capacity(items.size_hint().0);
        for (key, item) in items {
            let terms = state.compute_terms(&key, &item)?;
            entries.insert(key, Entry { item, terms });
        }

        let mut indices = state.empty_indices();
        for (key, entry) in &entries {
            for (name, values) in &entry.terms {
                if let Some(index) = indices.get_mut(name) {
                    for value in values {
                        index.insert(value, key);
                    }
                }
            }
        }

        tracing::debug!(
            items = entries.len(),
            resource_version = %resource_version,
            "Replaced store contents"
        );

        state.items = entries;
        state.indices = indices;
        state.resource_version = Some(resource_version);
        state.last_replaced_at = Some(Utc::now());

        Ok(())
    }

    /// Register additional indexers and backfill them over existing items
    ///
    /// If any name is already registered the whole call is rejected and none
    /// of `new_indexers` is installed. Backfill is best effort: an item the
    /// new indexer fails on is left out of that index, every other item is
    /// still indexed, and the first failure is returned as
    /// [`StoreError::Backfill`].
    pub fn add_indexers(&self, new_indexers: Indexers<T>) -> StoreResult<()> {
        let mut guard = self.write_state();
        let state = &mut *guard;

        let mut conflicts: Vec<String> = new_indexers
            .keys()
            .filter(|name| state.indexers.contains_key(*name))
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            conflicts.sort();
            return Err(StoreError::DuplicateIndexerName(conflicts));
        }

        // Evaluate everything first; the state is touched only below.
        let mut backfills = Vec::with_capacity(new_indexers.len());
        let mut first_failure = None;

        for (name, indexer) in &new_indexers {
            let mut filed: Vec<(String, HashSet<String>)> = Vec::new();
            let mut failed: Option<(String, ExtractError)> = None;
            let mut failures = 0;

            if !state.items.is_empty() {
                for (key, entry) in &state.items {
                    match value_set(indexer.as_ref(), &entry.item) {
                        Ok(values) if values.is_empty() => {}
                        Ok(values) => filed.push((key.clone(), values)),
                        Err(source) => {
                            tracing::warn!(
                                indexer = %name,
                                key = %key,
                                error = %source,
                                "Index function failed during backfill"
                            );
                            failures += 1;
                            failed.get_or_insert((key.clone(), source));
                        }
                    }
                }
            }

            if let Some((key, source)) = failed {
                first_failure.get_or_insert(StoreError::Backfill {
                    indexer: name.clone(),
                    key,
                    failures,
                    source,
                });
            }
            backfills.push((name.clone(), filed));
        }

        for (name, filed) in backfills {
            let mut index = Index::new();
            for (key, values) in filed {
                for value in &values {
                    index.insert(value, &key);
                }
                if let Some(entry) = state.items.get_mut(&key) {
                    entry.terms.insert(name.clone(), values);
                }
            }

            tracing::debug!(
                indexer = %name,
                buckets = index.bucket_count(),
                "Registered indexer"
            );
            state.indices.insert(name, index);
        }
        state.indexers.extend(new_indexers);

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    // ==================== Query Methods ====================

    /// Registered indexer name → index function
    pub fn get_indexers(&self) -> Indexers<T> {
        self.read_state().indexers.clone()
    }

    /// Keys currently filed under `value` in index `index_name`
    ///
    /// Empty (not an error) if no key produces that value.
    pub fn index_keys(&self, index_name: &str, value: &str) -> StoreResult<Vec<String>> {
        let state = self.read_state();
        let index = state
            .indices
            .get(index_name)
            .ok_or_else(|| StoreError::UnknownIndexer(index_name.to_string()))?;

        Ok(index.keys(value))
    }

    /// All values of index `index_name` that currently have at least one key
    ///
    /// Empty for an unknown index.
    pub fn list_index_func_values(&self, index_name: &str) -> Vec<String> {
        self.read_state()
            .indices
            .get(index_name)
            .map(Index::values)
            .unwrap_or_default()
    }

    /// Check if a key is stored
    pub fn contains_key(&self, key: &str) -> bool {
        self.read_state().items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read_state().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_state().items.is_empty()
    }

    /// Snapshot of all keys
    pub fn list_keys(&self) -> Vec<String> {
        self.read_state().items.keys().cloned().collect()
    }

    /// Version token passed to the last [`replace`](Self::replace)
    pub fn resource_version(&self) -> Option<String> {
        self.read_state().resource_version.clone()
    }

    /// Get statistics about the store
    pub fn stats(&self) -> StoreStats {
        let state = self.read_state();

        StoreStats {
            items: state.items.len(),
            indexers: state.indexers.len(),
            buckets: state.indices.values().map(Index::bucket_count).sum(),
            index_entries: state.indices.values().map(Index::entry_count).sum(),
            resource_version: state.resource_version.clone(),
            last_replaced_at: state.last_replaced_at,
        }
    }
}

impl<T: Clone> ThreadSafeStore<T> {
    /// Current item at `key`
    pub fn get(&self, key: &str) -> Option<T> {
        self.read_state().items.get(key).map(|e| e.item.clone())
    }

    /// Snapshot of all items
    pub fn list(&self) -> Vec<T> {
        self.read_state()
            .items
            .values()
            .map(|e| e.item.clone())
            .collect()
    }

    /// Items currently filed under `value` in index `index_name`
    pub fn by_index(&self, index_name: &str, value: &str) -> StoreResult<Vec<T>> {
        let state = self.read_state();
        let index = state
            .indices
            .get(index_name)
            .ok_or_else(|| StoreError::UnknownIndexer(index_name.to_string()))?;

        Ok(index
            .get(value)
            .map(|bucket| {
                bucket
                    .iter()
                    .filter_map(|key| state.items.get(key))
                    .map(|e| e.item.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Items sharing any value that `obj` produces under index `index_name`
    pub fn index(&self, index_name: &str, obj: &T) -> StoreResult<Vec<T>> {
        let state = self.read_state();
        let unknown = || StoreError::UnknownIndexer(index_name.to_string());
        let indexer = state.indexers.get(index_name).ok_or_else(unknown)?;
        let index = state.indices.get(index_name).ok_or_else(unknown)?;

        let values =
            value_set(indexer.as_ref(), obj).map_err(|source| StoreError::IndexQuery {
                indexer: index_name.to_string(),
                source,
            })?;

        let keys: HashSet<&String> = values
            .iter()
            .filter_map(|value| index.get(value))
            .flatten()
            .collect();

        Ok(keys
            .into_iter()
            .filter_map(|key| state.items.get(key))
            .map(|e| e.item.clone())
            .collect())
    }
}

impl<T> Default for ThreadSafeStore<T> {
    fn default() -> Self {
        Self::new(Indexers::new())
    }
}

impl<T> fmt::Debug for ThreadSafeStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.read_state();
        let mut indexers: Vec<&String> = state.indexers.keys().collect();
        indexers.sort();

        f.debug_struct("ThreadSafeStore")
            .field("items", &state.items.len())
            .field("indexers", &indexers)
            .finish()
    }
}

/// Store statistics
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub items: usize,
    pub indexers: usize,
    /// Non-empty buckets across all indices
    pub buckets: usize,
    /// Key entries across all buckets
    pub index_entries: usize,
    pub resource_version: Option<String>,
    pub last_replaced_at: Option<DateTime<Utc>>,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Items: {}, Indexers: {}, Buckets: {}, Entries: {}, Version: {}",
            self.items,
            self.indexers,
            self.buckets,
            self.index_entries,
            self.resource_version.as_deref().unwrap_or("-")
        )
    }
}

#[cfg(test)]
impl<T> ThreadSafeStore<T> {
    /// Verify table/index agreement under a single read lock
    fn check_consistency(&self) -> Result<(), String> {
        let state = self.read_state();

        if state.indices.len() != state.indexers.len() {
            return Err("index and indexer sets differ".to_string());
        }

        for (key, entry) in &state.items {
            for (name, indexer) in &state.indexers {
                let index = &state.indices[name];
                let Ok(values) = value_set(indexer.as_ref(), &entry.item) else {
                    continue;
                };
                for value in &values {
                    if !index.get(value).is_some_and(|b| b.contains(key)) {
                        return Err(format!("{key} missing from {name}[{value}]"));
                    }
                }
            }
        }

        for (name, index) in &state.indices {
            for (value, bucket) in index.iter() {
                if bucket.is_empty() {
                    return Err(format!("empty bucket {name}[{value}]"));
                }
                for key in bucket {
                    let Some(entry) = state.items.get(key) else {
                        return Err(format!("deleted key {key} left in {name}[{value}]"));
                    };
                    let values = value_set(state.indexers[name].as_ref(), &entry.item)
                        .map_err(|e| e.to_string())?;
                    if !values.contains(value) {
                        return Err(format!("stale entry {key} in {name}[{value}]"));
                    }
                }
            }
        }

        Ok(())
    }
}
