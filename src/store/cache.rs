//! Object cache keyed by a key function
//!
//! Wraps a [`ThreadSafeStore`] so callers hand in whole objects and the key
//! is derived for them, the way a watch loop mirrors a remote collection.

use crate::store::error::{StoreError, StoreResult};
use crate::store::indexer::{Indexers, KeyFunc};
use crate::store::thread_safe::{StoreStats, ThreadSafeStore};

/// Indexed object cache keyed by a [`KeyFunc`]
pub struct Cache<T> {
    key_func: KeyFunc<T>,
    store: ThreadSafeStore<T>,
}

impl<T> Cache<T> {
    /// Create an empty cache
    pub fn new(key_func: KeyFunc<T>, indexers: Indexers<T>) -> Self {
        Self::with_capacity(key_func, indexers, 0)
    }

    pub fn with_capacity(key_func: KeyFunc<T>, indexers: Indexers<T>, capacity: usize) -> Self {
        Self {
            key_func,
            store: ThreadSafeStore::with_capacity(indexers, capacity),
        }
    }

    /// Key the cache would file `obj` under
    pub fn key_of(&self, obj: &T) -> StoreResult<String> {
        (self.key_func)(obj).map_err(StoreError::KeyFunction)
    }

    /// Insert or overwrite `obj`
    pub fn add(&self, obj: T) -> StoreResult<()> {
        let key = self.key_of(&obj)?;
        self.store.add(key, obj)
    }

    pub fn update(&self, obj: T) -> StoreResult<()> {
        let key = self.key_of(&obj)?;
        self.store.update(key, obj)
    }

    /// Remove the object stored under `obj`'s key
    pub fn delete(&self, obj: &T) -> StoreResult<Option<T>> {
        let key = self.key_of(obj)?;
        Ok(self.store.delete(&key))
    }

    /// Replace the whole contents with `objects`
    pub fn replace(&self, objects: Vec<T>, resource_version: impl Into<String>) -> StoreResult<()> {
        let items = objects
            .into_iter()
            .map(|obj| Ok((self.key_of(&obj)?, obj)))
            .collect::<StoreResult<Vec<_>>>()?;

        self.store.replace(items, resource_version)
    }

    pub fn add_indexers(&self, new_indexers: Indexers<T>) -> StoreResult<()> {
        self.store.add_indexers(new_indexers)
    }

    pub fn get_indexers(&self) -> Indexers<T> {
        self.store.get_indexers()
    }

    pub fn index_keys(&self, index_name: &str, value: &str) -> StoreResult<Vec<String>> {
        self.store.index_keys(index_name, value)
    }

    pub fn list_index_func_values(&self, index_name: &str) -> Vec<String> {
        self.store.list_index_func_values(index_name)
    }

    pub fn list_keys(&self) -> Vec<String> {
        self.store.list_keys()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn resource_version(&self) -> Option<String> {
        self.store.resource_version()
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }
}

impl<T: Clone> Cache<T> {
    /// Stored version of `obj`, looked up by its key
    pub fn get(&self, obj: &T) -> StoreResult<Option<T>> {
        let key = self.key_of(obj)?;
        Ok(self.store.get(&key))
    }

    pub fn get_by_key(&self, key: &str) -> Option<T> {
        self.store.get(key)
    }

    pub fn list(&self) -> Vec<T> {
        self.store.list()
    }

    pub fn by_index(&self, index_name: &str, value: &str) -> StoreResult<Vec<T>> {
        self.store.by_index(index_name, value)
    }

    pub fn index(&self, index_name: &str, obj: &T) -> StoreResult<Vec<T>> {
        self.store.index(index_name, obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::error::ExtractError;
    use crate::store::indexer::{index_func, key_func};

    #[derive(Debug, Clone, PartialEq)]
    struct Pod {
        name: String,
        node: String,
    }

    fn pod(name: &str, node: &str) -> Pod {
        Pod {
            name: name.to_string(),
            node: node.to_string(),
        }
    }

    fn create_test_cache() -> Cache<Pod> {
        let mut indexers = Indexers::new();
        indexers.insert(
            "node".to_string(),
            index_func(|p: &Pod| Ok(vec![p.node.clone()])),
        );

        Cache::new(
            key_func(|p: &Pod| {
                if p.name.is_empty() {
                    Err(ExtractError::MissingField("name".to_string()))
                } else {
                    Ok(p.name.clone())
                }
            }),
            indexers,
        )
    }

    #[test]
    fn test_add_and_get() {
        let cache = create_test_cache();
        cache.add(pod("web", "node-1")).unwrap();

        assert_eq!(cache.get_by_key("web"), Some(pod("web", "node-1")));
        assert_eq!(cache.get(&pod("web", "")).unwrap(), Some(pod("web", "node-1")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_update_moves_between_buckets() {
        let cache = create_test_cache();
        cache.add(pod("web", "node-1")).unwrap();
        cache.update(pod("web", "node-2")).unwrap();

        assert!(cache.by_index("node", "node-1").unwrap().is_empty());
        assert_eq!(
            cache.by_index("node", "node-2").unwrap(),
            vec![pod("web", "node-2")]
        );
    }

    #[test]
    fn test_delete() {
        let cache = create_test_cache();
        cache.add(pod("web", "node-1")).unwrap();

        let removed = cache.delete(&pod("web", "ignored")).unwrap();
        assert_eq!(removed, Some(pod("web", "node-1")));
        assert!(cache.is_empty());
        assert!(cache.list_index_func_values("node").is_empty());
    }

    #[test]
    fn test_key_function_failure() {
        let cache = create_test_cache();

        let err = cache.add(pod("", "node-1")).unwrap_err();
        assert!(matches!(err, StoreError::KeyFunction(ExtractError::MissingField(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_replace() {
        let cache = create_test_cache();
        cache.add(pod("old", "node-9")).unwrap();

        cache
            .replace(vec![pod("a", "node-1"), pod("b", "node-1")], "100")
            .unwrap();

        let mut keys = cache.index_keys("node", "node-1").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(cache.get_by_key("old").is_none());
        assert_eq!(cache.resource_version().as_deref(), Some("100"));
    }

    #[test]
    fn test_replace_with_bad_key_is_rejected() {
        let cache = create_test_cache();
        cache.add(pod("old", "node-9")).unwrap();

        assert!(cache.replace(vec![pod("a", "node-1"), pod("", "node-1")], "1").is_err());
        assert_eq!(cache.list_keys(), vec!["old"]);
    }

    #[test]
    fn test_index_by_object() {
        let cache = create_test_cache();
        cache.add(pod("a", "node-1")).unwrap();
        cache.add(pod("b", "node-2")).unwrap();

        let same_node = cache.index("node", &pod("probe", "node-2")).unwrap();
        assert_eq!(same_node, vec![pod("b", "node-2")]);
    }
}
