//! Time-stamped readings and time bounds

use serde::{Deserialize, Serialize};

use crate::model::error::{ModelError, ModelResult};
use crate::model::key::time_range;
use crate::storage::ScanRange;

/// One reading of a category
///
/// `time` is kept at full millisecond precision in the payload even though
/// the key only carries seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub value: f64,
    /// Unix timestamp in milliseconds
    pub time: i64,
}

impl Value {
    pub fn new(value: f64, time: i64) -> Self {
        Self { value, time }
    }

    pub(crate) fn encode(&self) -> ModelResult<Vec<u8>> {
        if !self.value.is_finite() {
            return Err(ModelError::Serialization(format!(
                "value {} is not a finite number",
                self.value
            )));
        }
        serde_json::to_vec(self).map_err(|e| ModelError::Serialization(e.to_string()))
    }

    pub(crate) fn decode(_identity: &str, key: &str, payload: &[u8]) -> ModelResult<Self> {
        serde_json::from_slice(payload).map_err(|e| ModelError::malformed(key, e))
    }
}

/// Time bounds for value and note scans
///
/// Both bounds are inclusive and in milliseconds. They are matched at second
/// granularity, the resolution of the key encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeQuery {
    pub gte: Option<i64>,
    pub lte: Option<i64>,
    pub reverse: bool,
}

impl TimeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gte(mut self, time: i64) -> Self {
        self.gte = Some(time);
        self
    }

    pub fn lte(mut self, time: i64) -> Self {
        self.lte = Some(time);
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Key range under `prefix` selected by these bounds
    pub fn to_range(&self, prefix: &str) -> ModelResult<ScanRange> {
        Ok(time_range(prefix, self.gte, self.lte)?.reverse(self.reverse))
    }
}
