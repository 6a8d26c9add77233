//! Sorted key-value stores
//!
//! Everything konsum-db persists lives in one sorted keyspace. This module
//! defines the contract the model layer needs from that keyspace and ships
//! two implementations:
//!
//! - **memory**: `BTreeMap` store for tests and throwaway sessions
//! - **sqlite**: single-table SQLite file for persistent use
//! - **factory**: picks one from configuration
//! - **error**: error types
//!
//! # Contract
//!
//! ```text
//! put(key, value)         whole-value overwrite of one key
//! get(key)                point read, None when absent
//! scan([gte, lte], rev)   lazy walk over keys in byte order, both bounds inclusive
//! ```

pub mod error;
pub mod factory;
pub mod memory;
pub mod sqlite;
pub mod types;

use async_trait::async_trait;

pub use error::{StorageError, StorageResult};
pub use factory::{open_store, Backend};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use types::{ScanRange, StoreRecord};

/// Pull-based iterator over a store range
///
/// Returns `None` once the range is exhausted. Dropping it early is fine;
/// iterators hold no locks between calls.
#[async_trait]
pub trait StoreIterator {
    async fn next(&mut self) -> StorageResult<Option<StoreRecord>>;
}

/// A sorted key-value store
#[async_trait]
pub trait Store: Send + Sync {
    /// Read one key
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>>;

    /// Write one key, replacing any previous value
    async fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    /// Open a lazy scan over `range`
    async fn scan(&self, range: ScanRange) -> StorageResult<Box<dyn StoreIterator + Send>>;
}
