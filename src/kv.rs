use std::{
    collections::hash_map,
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

/// A single intermediate or output record.
///
/// Field names on the wire are `Key` and `Value`, which is the layout the
/// map-side writers and the final merger agree on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyValue {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Reduce task that a map task assigns this record to.
    pub fn partition(&self, n_reduce: u64) -> u64 {
        let mut hasher = hash_map::DefaultHasher::new();
        self.key.hash(&mut hasher);
        (hasher.finish() & 0x7FFFFFFF) % n_reduce
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}
