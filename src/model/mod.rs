//! Entity model
//!
//! Typed records mapped onto the flat key space of a [`Store`](crate::storage::Store).
//! Each entity kind owns a key prefix and an attribute [`Schema`]; the generic
//! read/write behavior lives in [`record`].

pub mod category;
pub mod error;
pub mod key;
pub mod note;
pub mod record;
pub mod schema;
pub mod value;

pub use category::{Category, CATEGORY_SCHEMA};
pub use error::{ModelError, ModelResult};
pub use note::{Note, NOTE_SCHEMA};
pub use record::{Entity, Scan, BASE_SCHEMA};
pub use schema::{Attribute, AttributeType, AttributeValue, Attributes, DefaultValue, Schema};
pub use value::{TimeQuery, Value};
