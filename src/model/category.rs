//! Categories
//!
//! A category is one meter or metric stream, stored under
//! `categories.<name>`. Its readings live in a nested keyspace,
//! `categories.<name>.values.<seconds>`, and are only reachable through the
//! owning category.
//!
//! A full category scan also walks that nested keyspace; those records decode
//! as categories named `<name>.values.<seconds>`. Callers that only want real
//! categories skip names containing [`key::SEPARATOR`].

use std::borrow::Cow;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::model::error::ModelResult;
use crate::model::key::{self, CATEGORY_PREFIX};
use crate::model::record::{
    self, Entity, Scan, BASE_SCHEMA, DESCRIPTION, FRACTIONAL_DIGITS, UNIT,
};
use crate::model::schema::{Attributes, Schema};
use crate::model::value::{TimeQuery, Value};
use crate::storage::Store;

/// Categories add nothing to the base attributes
pub static CATEGORY_SCHEMA: Schema = Schema::extend(&BASE_SCHEMA, &[]);

/// Fallback display precision when a category carries none
const DEFAULT_FRACTIONAL_DIGITS: usize = 2;

/// Upper bound on display precision; stored values above it are clamped
pub const MAX_FRACTIONAL_DIGITS: usize = 20;

/// A meter identity with unit and precision metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    name: String,
    attributes: Attributes,
}

impl Category {
    /// Create a category with default attributes applied
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_attributes(name, Attributes::new())
    }

    /// Create a category from explicit attributes; defaults fill the gaps
    pub fn with_attributes(name: impl Into<String>, mut attributes: Attributes) -> Self {
        CATEGORY_SCHEMA.apply_defaults(&mut attributes);
        Self {
            name: name.into(),
            attributes,
        }
    }

    /// Builder: set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.attributes.set(DESCRIPTION, description.into());
        self
    }

    /// Builder: set physical unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.attributes.set(UNIT, unit.into());
        self
    }

    /// Builder: set display precision
    pub fn with_fractional_digits(mut self, digits: u32) -> Self {
        self.attributes.set(FRACTIONAL_DIGITS, digits);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.attributes.get(DESCRIPTION).and_then(|v| v.as_str())
    }

    pub fn unit(&self) -> Option<&str> {
        self.attributes.get(UNIT).and_then(|v| v.as_str())
    }

    /// Display precision, if set to a non-negative whole number
    ///
    /// Capped at [`MAX_FRACTIONAL_DIGITS`].
    pub fn fractional_digits(&self) -> Option<usize> {
        self.attributes
            .get(FRACTIONAL_DIGITS)
            .and_then(|v| v.as_number())
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n.min(MAX_FRACTIONAL_DIGITS as f64) as usize)
    }

    /// Scan all categories in name order
    pub async fn entries(store: &dyn Store) -> ModelResult<Scan<Category>> {
        record::entries(store, None, None).await
    }

    /// Scan categories whose names lie in `[gte, lte]`
    pub async fn entries_between(
        store: &dyn Store,
        gte: Option<&str>,
        lte: Option<&str>,
    ) -> ModelResult<Scan<Category>> {
        record::entries(store, gte, lte).await
    }

    /// Load one category by name
    pub async fn entry(store: &dyn Store, name: &str) -> ModelResult<Category> {
        record::entry(store, name).await
    }

    /// Persist this category, replacing any earlier version
    pub async fn write(&self, store: &dyn Store) -> ModelResult<()> {
        record::write(store, self).await
    }

    /// Export as an INI-style block named after the category
    pub async fn write_as_text<W>(&self, out: &mut W) -> ModelResult<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        record::write_as_text(out, &self.name, self).await
    }

    /// Store one reading; a second reading in the same second replaces it
    pub async fn write_value(&self, store: &dyn Store, value: f64, time: i64) -> ModelResult<()> {
        let key = key::value_key(&self.key(), time)?;
        let payload = Value::new(value, time).encode()?;
        store.put(key.as_bytes(), &payload).await?;
        tracing::debug!(category = %self.name, time, value, "wrote value");
        Ok(())
    }

    /// Scan this category's readings
    ///
    /// Ascending by time unless `query.reverse` is set. Without bounds the
    /// scan covers every reading of the category.
    pub async fn values(&self, store: &dyn Store, query: TimeQuery) -> ModelResult<Scan<Value>> {
        let prefix = key::values_prefix(&self.key());
        let range = query.to_range(&prefix)?;
        Scan::open(store, prefix, range, Value::decode).await
    }

    /// Write every reading, oldest first, as `<time> <value>` lines
    ///
    /// Values are rounded to the category's fractional digits. Returns the
    /// number of lines written.
    pub async fn pipe<W>(&self, store: &dyn Store, out: &mut W) -> ModelResult<usize>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let digits = self.fractional_digits().unwrap_or(DEFAULT_FRACTIONAL_DIGITS);
        let mut values = self.values(store, TimeQuery::new()).await?;
        let mut lines = 0;

        while let Some(Value { value, time }) = values.next().await? {
            out.write_all(format!("{} {:.*}\n", time, digits, value).as_bytes())
                .await?;
            lines += 1;
        }
        out.flush().await?;

        Ok(lines)
    }
}

impl Entity for Category {
    const PREFIX: &'static str = CATEGORY_PREFIX;

    fn schema() -> &'static Schema {
        &CATEGORY_SCHEMA
    }

    fn from_stored(identity: &str, attributes: Attributes) -> ModelResult<Self> {
        Ok(Self {
            name: identity.to_string(),
            attributes,
        })
    }

    fn key(&self) -> Cow<'_, str> {
        Cow::Owned(key::category_key(&self.name))
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.unit().unwrap_or_default())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        for attribute in CATEGORY_SCHEMA.attributes() {
            if let Some(value) = self.attributes.get(attribute.name) {
                map.serialize_entry(attribute.name, value)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::error::ModelError;
    use crate::storage::{MemoryStore, SqliteStore};
    use tempfile::tempdir;

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    const T0: i64 = 1_700_000_000_123;

    async fn write_daily_values(store: &dyn Store, category: &Category) {
        for i in 0..100 {
            category
                .write_value(store, 77.34 + i as f64, T0 + DAY_MS * i)
                .await
                .unwrap();
        }
    }

    #[test]
    fn test_new_category_has_defaults() {
        let category = Category::new("CAT-1").with_unit("kWh");

        assert_eq!(category.name(), "CAT-1");
        assert_eq!(category.unit(), Some("kWh"));
        assert_eq!(category.description(), None);
        assert_eq!(category.fractional_digits(), Some(2));
        assert_eq!(category.key(), "categories.CAT-1");
        assert_eq!(category.to_string(), "CAT-1: kWh");
        assert_eq!(Category::new("gas").to_string(), "gas: ");
    }

    #[test]
    fn test_category_json() {
        let category = Category::new("CAT-1")
            .with_unit("kWh")
            .with_description("main meter");

        let json = serde_json::to_value(&category).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "CAT-1",
                "description": "main meter",
                "unit": "kWh",
                "fractionalDigits": 2
            })
        );
    }

    #[tokio::test]
    async fn test_categories_write_read() {
        let store = MemoryStore::new();

        for i in 0..10 {
            Category::new(format!("CAT-{}", i))
                .with_unit("kWh")
                .write(&store)
                .await
                .unwrap();
        }

        let categories = Category::entries(&store)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(categories.len(), 10);
        assert_eq!(categories[0].name(), "CAT-0");
        assert_eq!(categories[0].unit(), Some("kWh"));

        let names: Vec<&str> = categories.iter().map(|c| c.name()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);

        let category = Category::entry(&store, "CAT-7").await.unwrap();
        assert_eq!(category.name(), "CAT-7");
        assert_eq!(category.unit(), Some("kWh"));
    }

    #[tokio::test]
    async fn test_round_trip_applies_default_digits() {
        let store = MemoryStore::new();
        store
            .put(b"categories.water", br#"{"unit":"kWh"}"#)
            .await
            .unwrap();

        let category = Category::entry(&store, "water").await.unwrap();
        assert_eq!(category.unit(), Some("kWh"));
        assert_eq!(category.fractional_digits(), Some(2));
    }

    #[tokio::test]
    async fn test_entry_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            Category::entry(&store, "missing").await,
            Err(ModelError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_second_write_replaces_first() {
        let store = MemoryStore::new();
        Category::new("CAT-1")
            .with_unit("kWh")
            .with_description("first")
            .write(&store)
            .await
            .unwrap();
        Category::new("CAT-1")
            .with_unit("m3")
            .write(&store)
            .await
            .unwrap();

        let categories = Category::entries(&store)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].unit(), Some("m3"));
        assert_eq!(categories[0].description(), None);
    }

    #[tokio::test]
    async fn test_entries_between() {
        let store = MemoryStore::new();
        for name in ["electricity", "gas", "water"] {
            Category::new(name).write(&store).await.unwrap();
        }

        let names: Vec<String> = Category::entries_between(&store, Some("f"), Some("h"))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["gas"]);
    }

    #[tokio::test]
    async fn test_values_write_read() {
        let store = MemoryStore::new();
        let category = Category::new("CAT-1").with_unit("kWh");
        category.write(&store).await.unwrap();
        write_daily_values(&store, &category).await;

        let values = category
            .values(&store, TimeQuery::new())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(values.len(), 100);
        assert_eq!(values[0], Value::new(77.34, T0));
        assert!(values.windows(2).all(|w| w[0].time < w[1].time));

        let last = category
            .values(&store, TimeQuery::new().gte(T0 + DAY_MS * 99).reverse(true))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(last, vec![Value::new(77.34 + 99.0, T0 + DAY_MS * 99)]);
    }

    #[tokio::test]
    async fn test_values_reverse_and_bounded() {
        let store = MemoryStore::new();
        let category = Category::new("CAT-1");
        write_daily_values(&store, &category).await;

        let reversed = category
            .values(&store, TimeQuery::new().reverse(true))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(reversed.len(), 100);
        assert!(reversed.windows(2).all(|w| w[0].time > w[1].time));

        let window = category
            .values(
                &store,
                TimeQuery::new().gte(T0 + DAY_MS * 10).lte(T0 + DAY_MS * 12),
            )
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let times: Vec<i64> = window.iter().map(|v| v.time).collect();
        assert_eq!(times, vec![T0 + DAY_MS * 10, T0 + DAY_MS * 11, T0 + DAY_MS * 12]);
    }

    #[tokio::test]
    async fn test_values_are_scoped_to_category() {
        let store = MemoryStore::new();
        let gas = Category::new("gas");
        let gas_meter = Category::new("gas-meter");

        gas.write_value(&store, 1.0, T0).await.unwrap();
        gas_meter.write_value(&store, 2.0, T0).await.unwrap();

        let values = gas
            .values(&store, TimeQuery::new())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(values, vec![Value::new(1.0, T0)]);
    }

    #[tokio::test]
    async fn test_same_second_overwrites_value() {
        let store = MemoryStore::new();
        let category = Category::new("CAT-1");

        category.write_value(&store, 1.0, T0).await.unwrap();
        category.write_value(&store, 2.0, T0 + 500).await.unwrap();

        let values = category
            .values(&store, TimeQuery::new())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(values, vec![Value::new(2.0, T0 + 500)]);
    }

    #[tokio::test]
    async fn test_write_value_rejects_bad_input() {
        let store = MemoryStore::new();
        let category = Category::new("CAT-1");

        assert!(matches!(
            category.write_value(&store, 1.0, -1).await,
            Err(ModelError::InvalidTimestamp(-1))
        ));
        assert!(matches!(
            category.write_value(&store, f64::NAN, T0).await,
            Err(ModelError::Serialization(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_category_scan_also_visits_nested_values() {
        let store = MemoryStore::new();
        let category = Category::new("CAT-1").with_unit("kWh");
        category.write(&store).await.unwrap();
        category.write_value(&store, 1.0, T0).await.unwrap();

        let names: Vec<String> = Category::entries(&store)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["CAT-1", "CAT-1.values.1700000000"]);
        assert!(names[1].contains(key::SEPARATOR));
    }

    #[tokio::test]
    async fn test_malformed_value_fails_scan() {
        let store = MemoryStore::new();
        let category = Category::new("CAT-1");
        category.write_value(&store, 1.0, T0).await.unwrap();
        store
            .put(b"categories.CAT-1.values.1800000000", b"oops")
            .await
            .unwrap();

        let result = category
            .values(&store, TimeQuery::new())
            .await
            .unwrap()
            .try_collect()
            .await;
        assert!(matches!(result, Err(ModelError::Malformed { .. })));
    }

    #[tokio::test]
    async fn test_pipe_uses_fractional_digits() {
        let store = MemoryStore::new();
        let category = Category::new("CAT-1").with_fractional_digits(1);
        category.write_value(&store, 2.0, 2_000).await.unwrap();
        category.write_value(&store, 1.24, 1_000).await.unwrap();

        let mut out = Vec::new();
        let lines = category.pipe(&store, &mut out).await.unwrap();

        assert_eq!(lines, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "1000 1.2\n2000 2.0\n");
    }

    #[tokio::test]
    async fn test_pipe_clamps_stored_precision() {
        let store = MemoryStore::new();
        store
            .put(b"categories.big", br#"{"fractionalDigits":100000}"#)
            .await
            .unwrap();
        let category = Category::entry(&store, "big").await.unwrap();
        assert_eq!(category.fractional_digits(), Some(MAX_FRACTIONAL_DIGITS));

        category.write_value(&store, 0.5, 1_000).await.unwrap();
        let mut out = Vec::new();
        assert_eq!(category.pipe(&store, &mut out).await.unwrap(), 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("1000 0.5{}\n", "0".repeat(19))
        );
    }

    #[tokio::test]
    async fn test_fractional_digits_ignores_invalid_numbers() {
        let store = MemoryStore::new();
        store
            .put(b"categories.neg", br#"{"fractionalDigits":-1}"#)
            .await
            .unwrap();
        store
            .put(b"categories.frac", br#"{"fractionalDigits":1.5}"#)
            .await
            .unwrap();

        for name in ["neg", "frac"] {
            let category = Category::entry(&store, name).await.unwrap();
            assert_eq!(category.fractional_digits(), None);
        }
    }

    #[tokio::test]
    async fn test_write_as_text() {
        let category = Category::new("CAT-1")
            .with_unit("kWh")
            .with_description("main meter");

        let mut out = Vec::new();
        category.write_as_text(&mut out).await.unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[CAT-1]\ndescription=main meter\nunit=kWh\nfractionalDigits=2\n\n"
        );
    }

    #[tokio::test]
    async fn test_values_on_sqlite_store() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("konsum.db"))
            .unwrap()
            .batch_size(7);
        let category = Category::new("CAT-1").with_unit("kWh");
        category.write(&store).await.unwrap();
        write_daily_values(&store, &category).await;

        let values = category
            .values(&store, TimeQuery::new())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(values.len(), 100);
        assert_eq!(values[0], Value::new(77.34, T0));

        let last = category
            .values(&store, TimeQuery::new().gte(T0 + DAY_MS * 99).reverse(true))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(last, vec![Value::new(77.34 + 99.0, T0 + DAY_MS * 99)]);

        let loaded = Category::entry(&store, "CAT-1").await.unwrap();
        assert_eq!(loaded, category);
    }
}
