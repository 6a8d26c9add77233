//! Core types shared by the store backends
//!
//! - `StoreRecord`: one key/value pair as held by a store
//! - `ScanRange`: inclusive key bounds plus scan direction

/// A single key/value pair read from a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRecord {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl StoreRecord {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Key range for scans (closed interval: [gte, lte])
///
/// Keys compare as raw bytes. A range whose `gte` sorts after its `lte`
/// is empty rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRange {
    /// Lowest key returned (inclusive)
    pub gte: Vec<u8>,
    /// Highest key returned (inclusive)
    pub lte: Vec<u8>,
    /// Walk from `lte` down to `gte` instead of upwards
    pub reverse: bool,
}

impl ScanRange {
    /// Create an ascending range
    pub fn new(gte: impl Into<Vec<u8>>, lte: impl Into<Vec<u8>>) -> Self {
        Self {
            gte: gte.into(),
            lte: lte.into(),
            reverse: false,
        }
    }

    /// Builder method: set scan direction
    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// True when no key can satisfy both bounds
    pub fn is_empty(&self) -> bool {
        self.gte > self.lte
    }

    /// Check if a key falls within this range
    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.gte.as_slice() && key <= self.lte.as_slice()
    }
}
