//! Store error types
//!
//! Defines all errors that can occur in the store and in the functions
//! plugged into it.

use thiserror::Error;

/// Failure of a key function or an index function on a single object
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// A required field was absent
    #[error("missing field: {0}")]
    MissingField(String),

    /// The object did not have the shape the function expected
    #[error("unexpected object shape: {0}")]
    UnexpectedShape(String),

    /// A key string could not be parsed
    #[error("unexpected key format: {0}")]
    InvalidKey(String),

    /// Any other failure reported by a caller-supplied function
    #[error("{0}")]
    Other(String),
}

/// Errors that can occur in the store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Lookup named an indexer that was never registered
    #[error("Index with name {0} does not exist")]
    UnknownIndexer(String),

    /// `add_indexers` named one or more indexers that already exist
    #[error("Indexer conflict: {}", .0.join(", "))]
    DuplicateIndexerName(Vec<String>),

    /// An indexer failed on an item while it was being stored
    #[error("Unable to calculate an index entry for key {key:?} on index {indexer}: {source}")]
    IndexFunction {
        indexer: String,
        key: String,
        #[source]
        source: ExtractError,
    },

    /// A newly registered indexer failed on an existing item
    #[error("Backfill of index {indexer} failed for {failures} item(s), first at key {key:?}: {source}")]
    Backfill {
        indexer: String,
        key: String,
        failures: usize,
        #[source]
        source: ExtractError,
    },

    /// An indexer failed on the probe object passed to `index`
    #[error("Unable to calculate index values on index {indexer}: {source}")]
    IndexQuery {
        indexer: String,
        #[source]
        source: ExtractError,
    },

    /// A key function could not derive a key for an object
    #[error("Couldn't create key for object: {0}")]
    KeyFunction(#[source] ExtractError),
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
