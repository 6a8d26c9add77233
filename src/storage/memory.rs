//! In-memory store backed by a `BTreeMap`
//!
//! Useful for tests and for callers that do not need durability. Scans keep
//! only a cursor (the last key handed out) and re-seek the map on every pull,
//! so an abandoned scan holds no lock.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::{ScanRange, StoreRecord};
use crate::storage::{Store, StoreIterator};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory implementation of the [`Store`] trait
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<RwLock<Map>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held
    pub fn len(&self) -> usize {
        self.data.read().map(|data| data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::Lock(format!("Failed to acquire read lock: {}", e)))?;
        Ok(data.get(key).cloned())
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::Lock(format!("Failed to acquire write lock: {}", e)))?;
        data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    #[tracing::instrument(level = "trace", skip_all)]
    async fn scan(&self, range: ScanRange) -> StorageResult<Box<dyn StoreIterator + Send>> {
        Ok(Box::new(MemoryIterator {
            data: Arc::clone(&self.data),
            done: range.is_empty(),
            range,
            cursor: None,
        }))
    }
}

/// Cursor over a [`MemoryStore`] range
struct MemoryIterator {
    data: Arc<RwLock<Map>>,
    range: ScanRange,
    /// Last key returned; the next pull starts strictly beyond it
    cursor: Option<Vec<u8>>,
    done: bool,
}

#[async_trait]
impl StoreIterator for MemoryIterator {
    async fn next(&mut self) -> StorageResult<Option<StoreRecord>> {
        if self.done {
            return Ok(None);
        }

        let found = {
            let data = self
                .data
                .read()
                .map_err(|e| StorageError::Lock(format!("Failed to acquire read lock: {}", e)))?;

            let gte = self.range.gte.as_slice();
            let lte = self.range.lte.as_slice();
            let entry = match (&self.cursor, self.range.reverse) {
                (None, false) => data
                    .range::<[u8], _>((Included(gte), Included(lte)))
                    .next(),
                (Some(last), false) => data
                    .range::<[u8], _>((Excluded(last.as_slice()), Included(lte)))
                    .next(),
                (None, true) => data
                    .range::<[u8], _>((Included(gte), Included(lte)))
                    .next_back(),
                (Some(last), true) => data
                    .range::<[u8], _>((Included(gte), Excluded(last.as_slice())))
                    .next_back(),
            };
            entry.map(|(k, v)| StoreRecord::new(k.clone(), v.clone()))
        };

        match found {
            Some(record) => {
                self.cursor = Some(record.key.clone());
                Ok(Some(record))
            }
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }
}
