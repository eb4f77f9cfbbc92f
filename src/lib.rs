//! # Mirrorstore
//!
//! Indexed, thread-safe in-memory object store used as the backing store of
//! a cache that mirrors a remote system's objects.
//!
//! ## Features
//!
//! - **Concurrent access**: One RwLock; unlimited readers, exclusive writers
//! - **Secondary indices**: Any number of named index functions, kept exactly
//!   in step with the primary table on every mutation
//! - **Late registration**: Indexers added to a populated store are backfilled
//! - **No leaks**: Index buckets are dropped as soon as they empty
//!
//! ## Modules
//!
//! - [`store`]: The indexed store and key-function cache
//! - [`objects`]: Key and index functions for JSON objects
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust
//! use mirrorstore::objects::{meta_namespace_key_func, namespace_indexer, NAMESPACE_INDEX};
//! use mirrorstore::store::{Cache, Indexers};
//! use serde_json::json;
//!
//! let mut indexers = Indexers::new();
//! indexers.insert(NAMESPACE_INDEX.to_string(), namespace_indexer());
//! let cache = Cache::new(meta_namespace_key_func(), indexers);
//!
//! cache.add(json!({"metadata": {"name": "web", "namespace": "prod"}}))?;
//! cache.add(json!({"metadata": {"name": "db", "namespace": "prod"}}))?;
//!
//! assert_eq!(cache.by_index(NAMESPACE_INDEX, "prod")?.len(), 2);
//! assert!(cache.get_by_key("prod/web").is_some());
//! # Ok::<(), mirrorstore::StoreError>(())
//! ```

pub mod config;
pub mod objects;
pub mod store;

// Re-export top-level types for convenience
pub use store::{
    index_func, key_func, Cache, ExtractError, Index, IndexFunc, Indexer, Indexers, KeyFunc,
    StoreError, StoreResult, StoreStats, ThreadSafeStore,
};

pub use config::{Config, ConfigError, ConfigSource, IndexerConfig, LoggingConfig, StoreConfig};
