//! Store construction from configuration

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::StorageConfig;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::memory::MemoryStore;
use crate::storage::sqlite::SqliteStore;
use crate::storage::Store;

/// Which store implementation to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// File-backed SQLite table
    #[default]
    Sqlite,
    /// Process-local `BTreeMap`, lost on exit
    Memory,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Sqlite => write!(f, "sqlite"),
            Backend::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for Backend {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(Backend::Sqlite),
            "memory" => Ok(Backend::Memory),
            other => Err(StorageError::Config(format!("unknown backend: {}", other))),
        }
    }
}

/// Open the store described by `config`
pub fn open_store(config: &StorageConfig) -> StorageResult<Arc<dyn Store>> {
    match config.backend {
        Backend::Sqlite => {
            let store = SqliteStore::open(&config.path)?.batch_size(config.scan_batch_size);
            Ok(Arc::new(store))
        }
        Backend::Memory => {
            tracing::info!("Using in-memory store; nothing will be persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
