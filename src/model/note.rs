//! Notes: free-text annotations on a category

use std::borrow::Cow;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio::io::AsyncWrite;

use crate::model::category::Category;
use crate::model::error::{ModelError, ModelResult};
use crate::model::key::{self, NOTE_PREFIX};
use crate::model::record::{self, Entity, Scan, DESCRIPTION};
use crate::model::schema::{Attribute, Attributes, Schema};
use crate::model::value::TimeQuery;
use crate::storage::Store;

static NOTE_ATTRIBUTES: [Attribute; 1] = [Attribute::string(DESCRIPTION)];

pub static NOTE_SCHEMA: Schema = Schema::new(&NOTE_ATTRIBUTES);

/// An annotation scoped to one category and one second
///
/// The key is derived once at construction. The category is held by name
/// only, so a note outlives the category it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    key: String,
    time: i64,
    category: String,
    attributes: Attributes,
}

impl Note {
    /// Create a note; fails with `InvalidTimestamp` for unencodable times
    pub fn new(
        time: i64,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> ModelResult<Self> {
        let category = category.into();
        let key = Self::key_for(&category, time)?;
        let mut attributes = Attributes::new();
        attributes.set(DESCRIPTION, description.into());
        NOTE_SCHEMA.apply_defaults(&mut attributes);

        Ok(Self {
            key,
            time,
            category,
            attributes,
        })
    }

    pub fn for_category(
        time: i64,
        category: &Category,
        description: impl Into<String>,
    ) -> ModelResult<Self> {
        Self::new(time, category.name(), description)
    }

    /// Key a note for `category` at `time` is stored under
    pub fn key_for(category: &str, time: i64) -> ModelResult<String> {
        key::note_key(category, time)
    }

    /// Unix milliseconds; whole seconds once read back from the store
    pub fn time(&self) -> i64 {
        self.time
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn description(&self) -> Option<&str> {
        self.attributes.get(DESCRIPTION).and_then(|v| v.as_str())
    }

    /// Scan all notes, ordered by category name then time
    pub async fn entries(store: &dyn Store) -> ModelResult<Scan<Note>> {
        record::entries(store, None, None).await
    }

    /// Scan the notes of one category in time order
    ///
    /// Keys are not escaped, so notes of a category named `<category>.<x>`
    /// share the `notes.<category>.` prefix. An open upper bound also returns
    /// them, after the category's own notes. Check [`Note::category`] when
    /// such names exist.
    pub async fn entries_for(
        store: &dyn Store,
        category: &str,
        query: TimeQuery,
    ) -> ModelResult<Scan<Note>> {
        let range = query.to_range(&key::note_prefix(category))?;
        record::entries_in(store, range).await
    }

    /// Load the note of `category` at `time`
    pub async fn entry(store: &dyn Store, category: &str, time: i64) -> ModelResult<Note> {
        let key = Self::key_for(category, time)?;
        let identity = key.strip_prefix(NOTE_PREFIX).unwrap_or(&key);
        record::entry(store, identity).await
    }

    pub async fn write(&self, store: &dyn Store) -> ModelResult<()> {
        record::write(store, self).await
    }

    /// Export as an INI-style block named after the note key
    pub async fn write_as_text<W>(&self, out: &mut W) -> ModelResult<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        record::write_as_text(out, &self.key, self).await
    }
}

impl Entity for Note {
    const PREFIX: &'static str = NOTE_PREFIX;

    fn schema() -> &'static Schema {
        &NOTE_SCHEMA
    }

    fn from_stored(identity: &str, attributes: Attributes) -> ModelResult<Self> {
        let (category, time) = key::split_note_identity(identity).ok_or_else(|| {
            ModelError::malformed(
                format!("{}{}", NOTE_PREFIX, identity),
                "expected <category>.<seconds>",
            )
        })?;

        Ok(Self {
            key: format!("{}{}", NOTE_PREFIX, identity),
            time,
            category: category.to_string(),
            attributes,
        })
    }

    fn key(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.key)
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

impl Serialize for Note {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("category", &self.category)?;
        map.serialize_entry("time", &self.time)?;
        if let Some(description) = self.description() {
            map.serialize_entry(DESCRIPTION, description)?;
        }
        map.end()
    }
}
