//! Pluggable index and key functions
//!
//! An indexer is a named function deriving zero or more index values from an
//! item. Any `Fn(&T) -> Result<Vec<String>, ExtractError>` closure is an
//! indexer:
//!
//! ```
//! use mirrorstore::store::{index_func, Indexers};
//!
//! let mut indexers: Indexers<String> = Indexers::new();
//! indexers.insert(
//!     "first-letter".to_string(),
//!     index_func(|item: &String| Ok(item.chars().take(1).map(String::from).collect())),
//! );
//! ```

use crate::store::error::ExtractError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Derives index values from an item
///
/// Implementations must be deterministic: the same item always yields the
/// same values.
pub trait IndexFunc<T>: Send + Sync {
    /// Index values the item is filed under (duplicates are ignored)
    fn values(&self, item: &T) -> Result<Vec<String>, ExtractError>;
}

impl<T, F> IndexFunc<T> for F
where
    F: Fn(&T) -> Result<Vec<String>, ExtractError> + Send + Sync,
{
    fn values(&self, item: &T) -> Result<Vec<String>, ExtractError> {
        self(item)
    }
}

/// Shared handle to a registered index function
pub type Indexer<T> = Arc<dyn IndexFunc<T>>;

/// Indexer name -> index function
pub type Indexers<T> = HashMap<String, Indexer<T>>;

/// Derives the primary key of an object
pub type KeyFunc<T> = Arc<dyn Fn(&T) -> Result<String, ExtractError> + Send + Sync>;

/// Wrap a closure as an [`Indexer`]
pub fn index_func<T, F>(f: F) -> Indexer<T>
where
    F: Fn(&T) -> Result<Vec<String>, ExtractError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a [`KeyFunc`]
pub fn key_func<T, F>(f: F) -> KeyFunc<T>
where
    F: Fn(&T) -> Result<String, ExtractError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Apply an indexer and collapse its output into a set
pub(crate) fn value_set<T>(indexer: &dyn IndexFunc<T>, item: &T) -> Result<HashSet<String>, ExtractError> {
    Ok(indexer.values(item)?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_index_func() {
        let indexer: Indexer<String> = index_func(|s: &String| Ok(vec![s.to_uppercase()]));
        assert_eq!(indexer.values(&"abc".to_string()).unwrap(), vec!["ABC"]);
    }

    #[test]
    fn test_value_set_dedupes() {
        let indexer: Indexer<String> =
            index_func(|s: &String| Ok(s.split(',').map(String::from).collect()));

        let set = value_set(indexer.as_ref(), &"a,b,a".to_string()).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("a"));
        assert!(set.contains("b"));
    }

    #[test]
    fn test_failing_index_func() {
        let indexer: Indexer<String> =
            index_func(|_: &String| Err(ExtractError::Other("boom".to_string())));
        assert!(value_set(indexer.as_ref(), &String::new()).is_err());
    }
}
