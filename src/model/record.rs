//! Entity base record
//!
//! Generic read/write behavior shared by every entity kind. An entity kind
//! implements [`Entity`] to supply its key prefix and schema; the free
//! functions here do the rest:
//!
//! ```text
//! entries(store, gte?, lte?)  → Scan<E>   lazy, ascending by key
//! entries_in(store, range)    → Scan<E>   explicit bounds / direction
//! entry(store, identity)      → E         NotFound when absent
//! write(store, &entity)                   one put, full replace
//! write_as_text(out, name, &entity)       INI-style block
//! ```

use std::borrow::Cow;

use futures_util::stream::{self, Stream};
use tokio::io::AsyncWrite;

use crate::model::error::{ModelError, ModelResult};
use crate::model::key::prefix_range;
use crate::model::schema::{Attribute, Attributes, DefaultValue, Schema};
use crate::storage::{ScanRange, Store, StoreIterator, StoreRecord};

/// Free-text description
pub const DESCRIPTION: &str = "description";

/// Physical unit label, e.g. "kWh"
pub const UNIT: &str = "unit";

/// Display precision for values
pub const FRACTIONAL_DIGITS: &str = "fractionalDigits";

static BASE_ATTRIBUTES: [Attribute; 3] = [
    Attribute::string(DESCRIPTION),
    Attribute::string(UNIT),
    Attribute::number(FRACTIONAL_DIGITS).with_default(DefaultValue::Number(2.0)),
];

/// Attributes every meter-like entity kind starts from
pub static BASE_SCHEMA: Schema = Schema::new(&BASE_ATTRIBUTES);

/// A record type persisted under its own key prefix
pub trait Entity: Sized + Send + Sync {
    /// Key prefix of this entity kind's keyspace
    const PREFIX: &'static str;

    /// Declared attributes
    fn schema() -> &'static Schema;

    /// Build an instance from a stored record
    ///
    /// `identity` is the key with [`Entity::PREFIX`] stripped; `attributes`
    /// have already been decoded and defaulted.
    fn from_stored(identity: &str, attributes: Attributes) -> ModelResult<Self>;

    /// Full store key of this instance
    fn key(&self) -> Cow<'_, str>;

    fn attributes(&self) -> &Attributes;
}

/// Decodes one record; arguments are identity, full key, payload
pub type Decoder<T> = fn(&str, &str, &[u8]) -> ModelResult<T>;

/// Lazy scan over a key range, decoding one record per pull
///
/// Each call to [`Scan::next`] pulls one record from the store. A decoding
/// failure is returned once and ends the scan. Opening a new scan starts
/// over from the range bounds.
pub struct Scan<T> {
    inner: Box<dyn StoreIterator + Send>,
    /// Stripped from every key to form the identity
    prefix: String,
    decode: Decoder<T>,
    done: bool,
}

impl<T> Scan<T> {
    /// Open a scan over `range`, stripping `prefix` from keys
    pub async fn open(
        store: &dyn Store,
        prefix: impl Into<String>,
        range: ScanRange,
        decode: Decoder<T>,
    ) -> ModelResult<Self> {
        let prefix = prefix.into();
        tracing::trace!(
            prefix = %prefix,
            reverse = range.reverse,
            "opening scan"
        );
        let inner = store.scan(range).await?;
        Ok(Self {
            inner,
            prefix,
            decode,
            done: false,
        })
    }

    /// Next decoded record, or `None` once the range is exhausted
    pub async fn next(&mut self) -> ModelResult<Option<T>> {
        if self.done {
            return Ok(None);
        }

        let record = match self.inner.next().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.done = true;
                return Ok(None);
            }
            Err(e) => {
                self.done = true;
                return Err(e.into());
            }
        };

        match self.decode_record(record) {
            Ok(item) => Ok(Some(item)),
            Err(e) => {
                self.done = true;
                Err(e)
            }
        }
    }

    fn decode_record(&self, record: StoreRecord) -> ModelResult<T> {
        let key = String::from_utf8(record.key).map_err(|e| {
            ModelError::malformed(String::from_utf8_lossy(e.as_bytes()), "key is not UTF-8")
        })?;
        let identity = key
            .strip_prefix(self.prefix.as_str())
            .ok_or_else(|| ModelError::malformed(key.as_str(), "key outside scanned prefix"))?;
        (self.decode)(identity, &key, &record.value)
    }

    /// Drain the scan into a vector, stopping at the first error
    pub async fn try_collect(mut self) -> ModelResult<Vec<T>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Adapt the scan into a `Stream`
    pub fn into_stream(self) -> impl Stream<Item = ModelResult<T>> {
        stream::try_unfold(self, |mut scan| async move {
            let item = scan.next().await?;
            Ok::<_, ModelError>(item.map(|item| (item, scan)))
        })
    }
}

fn decode_entity<E: Entity>(identity: &str, key: &str, payload: &[u8]) -> ModelResult<E> {
    let attributes = E::schema().decode(key, payload)?;
    E::from_stored(identity, attributes)
}

/// Scan every instance of `E` whose identity lies in `[gte, lte]`
///
/// Missing bounds cover the whole keyspace of `E`.
pub async fn entries<E: Entity>(
    store: &dyn Store,
    gte: Option<&str>,
    lte: Option<&str>,
) -> ModelResult<Scan<E>> {
    entries_in(store, prefix_range(E::PREFIX, gte, lte)).await
}

/// Scan instances of `E` within an explicit key range
pub async fn entries_in<E: Entity>(store: &dyn Store, range: ScanRange) -> ModelResult<Scan<E>> {
    Scan::open(store, E::PREFIX, range, decode_entity::<E>).await
}

/// Load one instance of `E` by identity
pub async fn entry<E: Entity>(store: &dyn Store, identity: &str) -> ModelResult<E> {
    let key = format!("{}{}", E::PREFIX, identity);
    let payload = store
        .get(key.as_bytes())
        .await?
        .ok_or_else(|| ModelError::NotFound(key.clone()))?;
    decode_entity(identity, &key, &payload)
}

/// Persist `entity` under its key, replacing whatever was there
pub async fn write<E: Entity>(store: &dyn Store, entity: &E) -> ModelResult<()> {
    let key = entity.key();
    let payload = E::schema().encode(entity.attributes())?;
    store.put(key.as_bytes(), &payload).await?;
    tracing::debug!(key = %key, bytes = payload.len(), "wrote record");
    Ok(())
}

/// Export `entity` as an INI-style block headed `[name]`
pub async fn write_as_text<E, W>(out: &mut W, name: &str, entity: &E) -> ModelResult<()>
where
    E: Entity,
    W: AsyncWrite + Unpin + ?Sized,
{
    E::schema().write_text(out, name, entity.attributes()).await
}
