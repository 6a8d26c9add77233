//! # konsum-db
//!
//! Utility-meter persistence on a single sorted key-value store.
//!
//! Categories (meters), their time-stamped values and free-text notes share
//! one keyspace. Key encoding keeps each entity kind in its own prefix and
//! makes byte order equal to logical order, so listing is a prefix scan and
//! time queries are range scans in either direction.
//!
//! ## Modules
//!
//! - [`storage`]: the sorted store contract plus memory and SQLite stores
//! - [`model`]: key codec, attribute schemas and the entity kinds
//! - [`export`]: INI-style text export
//! - [`config`]: TOML configuration with environment overrides
//! - [`time`]: timestamp parsing for the command line
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use konsum_db::model::{Category, TimeQuery};
//! use konsum_db::storage::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new();
//!
//!     let power = Category::new("power").with_unit("kWh");
//!     power.write(&store).await?;
//!     power.write_value(&store, 77.34, 1_700_000_000_000).await?;
//!
//!     let values = power.values(&store, TimeQuery::new()).await?.try_collect().await?;
//!     println!("{} readings", values.len());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod export;
pub mod model;
pub mod storage;
pub mod time;

pub use config::{Config, ConfigError, LoggingConfig, StorageConfig};
pub use export::export_text;
pub use model::{Category, Entity, ModelError, ModelResult, Note, Scan, TimeQuery, Value};
pub use storage::{
    open_store, Backend, MemoryStore, ScanRange, SqliteStore, Store, StorageError, StorageResult,
};
pub use time::{parse_time, TimeParseError};
