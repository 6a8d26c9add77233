//! Attribute schemas
//!
//! Each entity kind declares its persisted fields once, as a static list of
//! [`Attribute`] descriptors. The same list drives JSON encoding, default
//! filling on load, and the `name=value` text export. A schema may extend a
//! base schema; the base's attributes come first and cannot be removed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::model::error::{ModelError, ModelResult};

/// Largest integer an f64 holds exactly (2^53)
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Value type of a declared attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Number,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::String => write!(f, "string"),
            AttributeType::Number => write!(f, "number"),
        }
    }
}

/// Default for an attribute missing from a stored payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Text(&'static str),
    Number(f64),
}

/// One declared, persisted field
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: AttributeType,
    pub default: Option<DefaultValue>,
}

impl Attribute {
    pub const fn string(name: &'static str) -> Self {
        Self {
            name,
            kind: AttributeType::String,
            default: None,
        }
    }

    pub const fn number(name: &'static str) -> Self {
        Self {
            name,
            kind: AttributeType::Number,
            default: None,
        }
    }

    pub const fn with_default(self, default: DefaultValue) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }
}

/// A present attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Number(f64),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            AttributeValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::Text(_) => None,
        }
    }

    pub fn kind(&self) -> AttributeType {
        match self {
            AttributeValue::Text(_) => AttributeType::String,
            AttributeValue::Number(_) => AttributeType::Number,
        }
    }

    /// JSON form; integral numbers are written without a fraction
    fn to_json(&self) -> Option<JsonValue> {
        match self {
            AttributeValue::Text(s) => Some(JsonValue::String(s.clone())),
            AttributeValue::Number(n) if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER => {
                Some(JsonValue::from(*n as i64))
            }
            AttributeValue::Number(n) => serde_json::Number::from_f64(*n).map(JsonValue::Number),
        }
    }

    /// Read a payload field declared as `kind`; `null` counts as absent
    fn from_json(value: &JsonValue, kind: AttributeType) -> Result<Option<Self>, String> {
        match (value, kind) {
            (JsonValue::Null, _) => Ok(None),
            (JsonValue::String(s), AttributeType::String) => {
                Ok(Some(AttributeValue::Text(s.clone())))
            }
            (JsonValue::Number(n), AttributeType::Number) => n
                .as_f64()
                .map(|n| Some(AttributeValue::Number(n)))
                .ok_or_else(|| format!("number {} out of range", n)),
            (other, kind) => Err(format!("expected {}, found {}", kind, other)),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_json() {
            Some(json) => json.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(s) => write!(f, "{}", s),
            AttributeValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        AttributeValue::Number(n)
    }
}

impl From<u32> for AttributeValue {
    fn from(n: u32) -> Self {
        AttributeValue::Number(n as f64)
    }
}

impl From<DefaultValue> for AttributeValue {
    fn from(default: DefaultValue) -> Self {
        match default {
            DefaultValue::Text(s) => AttributeValue::Text(s.to_string()),
            DefaultValue::Number(n) => AttributeValue::Number(n),
        }
    }
}

/// The attribute values present on one entity instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    values: BTreeMap<&'static str, AttributeValue>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: &'static str, value: impl Into<AttributeValue>) {
        self.values.insert(name, value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeValue> {
        self.values.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &AttributeValue)> {
        self.values.iter().map(|(name, value)| (*name, value))
    }
}

/// Declared attributes of one entity kind
#[derive(Debug)]
pub struct Schema {
    base: Option<&'static Schema>,
    own: &'static [Attribute],
}

impl Schema {
    pub const fn new(attributes: &'static [Attribute]) -> Self {
        Self {
            base: None,
            own: attributes,
        }
    }

    /// A schema holding every attribute of `base` followed by `attributes`
    pub const fn extend(base: &'static Schema, attributes: &'static [Attribute]) -> Self {
        Self {
            base: Some(base),
            own: attributes,
        }
    }

    /// All attributes in declaration order, base first
    pub fn attributes(&self) -> Vec<&'static Attribute> {
        let mut all = self.base.map(Schema::attributes).unwrap_or_default();
        all.extend(self.own.iter());
        all
    }

    pub fn find(&self, name: &str) -> Option<&'static Attribute> {
        self.attributes().into_iter().find(|a| a.name == name)
    }

    /// Fill every absent attribute that declares a default
    pub fn apply_defaults(&self, attributes: &mut Attributes) {
        for attribute in self.attributes() {
            if let Some(default) = attribute.default {
                if !attributes.contains(attribute.name) {
                    attributes.set(attribute.name, default);
                }
            }
        }
    }

    /// Serialize the declared attributes present in `attributes`
    pub fn encode(&self, attributes: &Attributes) -> ModelResult<Vec<u8>> {
        let mut object = Map::new();
        for attribute in self.attributes() {
            if let Some(value) = attributes.get(attribute.name) {
                let json = value.to_json().ok_or_else(|| {
                    ModelError::Serialization(format!(
                        "{} = {} is not representable as JSON",
                        attribute.name, value
                    ))
                })?;
                object.insert(attribute.name.to_string(), json);
            }
        }
        serde_json::to_vec(&JsonValue::Object(object))
            .map_err(|e| ModelError::Serialization(e.to_string()))
    }

    /// Decode a stored payload, applying defaults
    ///
    /// `key` only labels errors. Fields the schema does not declare are
    /// ignored; declared fields of the wrong JSON type make the record malformed.
    pub fn decode(&self, key: &str, payload: &[u8]) -> ModelResult<Attributes> {
        let json: JsonValue =
            serde_json::from_slice(payload).map_err(|e| ModelError::malformed(key, e))?;
        let object = match json {
            JsonValue::Object(object) => object,
            other => {
                return Err(ModelError::malformed(
                    key,
                    format!("expected a JSON object, found {}", other),
                ))
            }
        };

        let mut attributes = Attributes::new();
        for attribute in self.attributes() {
            if let Some(raw) = object.get(attribute.name) {
                let value = AttributeValue::from_json(raw, attribute.kind).map_err(|reason| {
                    ModelError::malformed(key, format!("{}: {}", attribute.name, reason))
                })?;
                if let Some(value) = value {
                    attributes.set(attribute.name, value);
                }
            }
        }
        self.apply_defaults(&mut attributes);
        Ok(attributes)
    }

    /// Write an INI-style block: `[name]`, one `attr=value` line per present
    /// attribute, then a blank line
    pub async fn write_text<W>(
        &self,
        out: &mut W,
        name: &str,
        attributes: &Attributes,
    ) -> ModelResult<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        out.write_all(format!("[{}]\n", name).as_bytes()).await?;
        for attribute in self.attributes() {
            if let Some(value) = attributes.get(attribute.name) {
                out.write_all(format!("{}={}\n", attribute.name, value).as_bytes())
                    .await?;
            }
        }
        out.write_all(b"\n").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static BASE_ATTRIBUTES: [Attribute; 2] = [
        Attribute::string("description"),
        Attribute::number("digits").with_default(DefaultValue::Number(2.0)),
    ];
    static BASE: Schema = Schema::new(&BASE_ATTRIBUTES);

    static DERIVED_ATTRIBUTES: [Attribute; 1] = [Attribute::string("serial")];
    static DERIVED: Schema = Schema::extend(&BASE, &DERIVED_ATTRIBUTES);

    #[test]
    fn test_derived_schema_keeps_base_first() {
        let names: Vec<&str> = DERIVED.attributes().iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["description", "digits", "serial"]);
        assert_eq!(DERIVED.find("digits").unwrap().kind, AttributeType::Number);
        assert!(BASE.find("serial").is_none());
    }

    #[test]
    fn test_encode_skips_absent_and_undeclared() {
        let mut attributes = Attributes::new();
        attributes.set("serial", "A-17");
        attributes.set("unknown", "dropped");

        let payload = DERIVED.encode(&attributes).unwrap();
        let json: JsonValue = serde_json::from_slice(&payload).unwrap();
        assert_eq!(json, serde_json::json!({ "serial": "A-17" }));
    }

    #[test]
    fn test_encode_integral_numbers_without_fraction() {
        let mut attributes = Attributes::new();
        attributes.set("digits", 3.0);
        assert_eq!(BASE.encode(&attributes).unwrap(), br#"{"digits":3}"#.to_vec());

        attributes.set("digits", 2.5);
        assert_eq!(BASE.encode(&attributes).unwrap(), br#"{"digits":2.5}"#.to_vec());

        attributes.set("digits", f64::NAN);
        assert!(matches!(
            BASE.encode(&attributes),
            Err(ModelError::Serialization(_))
        ));
    }

    #[test]
    fn test_decode_applies_defaults() {
        let attributes = DERIVED
            .decode("k", br#"{"description":"main meter","extra":1}"#)
            .unwrap();

        assert_eq!(
            attributes.get("description"),
            Some(&AttributeValue::Text("main meter".to_string()))
        );
        assert_eq!(attributes.get("digits"), Some(&AttributeValue::Number(2.0)));
        assert!(attributes.get("serial").is_none());
        assert!(attributes.get("extra").is_none());
    }

    #[test]
    fn test_decode_null_counts_as_absent() {
        let attributes = BASE.decode("k", br#"{"description":null,"digits":null}"#).unwrap();
        assert!(!attributes.contains("description"));
        assert_eq!(attributes.get("digits"), Some(&AttributeValue::Number(2.0)));
    }

    #[test]
    fn test_decode_rejects_malformed_payloads() {
        assert!(matches!(
            BASE.decode("k", b"not json"),
            Err(ModelError::Malformed { .. })
        ));
        assert!(matches!(
            BASE.decode("k", b"[1,2]"),
            Err(ModelError::Malformed { .. })
        ));

        let err = BASE.decode("k", br#"{"digits":"two"}"#).unwrap_err();
        assert!(err.to_string().contains("digits"));
    }

    #[tokio::test]
    async fn test_write_text_in_declaration_order() {
        let mut attributes = Attributes::new();
        attributes.set("serial", "A-17");
        attributes.set("digits", 2.0);

        let mut out = Vec::new();
        DERIVED.write_text(&mut out, "meter", &attributes).await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "[meter]\ndigits=2\nserial=A-17\n\n");
    }
}
