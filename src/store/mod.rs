//! Mirrorstore Indexed Store
//!
//! This module provides the in-memory object store:
//!
//! - **thread_safe**: Keyed table plus secondary indices behind one RwLock
//! - **index**: Inverted index (value → keys) for a single indexer
//! - **indexer**: Pluggable index and key function types
//! - **cache**: Store keyed by a key function instead of explicit keys
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   add(key, item) → run every indexer → diff old/new values → table + buckets
//!
//! Read Path:
//!   by_index(name, value) → bucket → keys → cloned items
//! ```
//!
//! # Example
//!
//! ```rust
//! use mirrorstore::store::{index_func, Indexers, ThreadSafeStore};
//!
//! let mut indexers: Indexers<String> = Indexers::new();
//! indexers.insert("by-value".to_string(), index_func(|v: &String| Ok(vec![v.clone()])));
//!
//! let store = ThreadSafeStore::new(indexers);
//! store.add("a", "red".to_string())?;
//! store.add("b", "red".to_string())?;
//!
//! let mut keys = store.index_keys("by-value", "red")?;
//! keys.sort();
//! assert_eq!(keys, vec!["a", "b"]);
//! # Ok::<(), mirrorstore::store::StoreError>(())
//! ```

pub mod cache;
pub mod error;
pub mod index;
pub mod indexer;
pub mod thread_safe;

// Re-export commonly used types
pub use cache::Cache;
pub use error::{ExtractError, StoreError, StoreResult};
pub use index::Index;
pub use indexer::{index_func, key_func, IndexFunc, Indexer, Indexers, KeyFunc};
pub use thread_safe::{StoreStats, ThreadSafeStore};
