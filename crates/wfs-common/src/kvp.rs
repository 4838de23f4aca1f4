//! Key-value-pair request parameters.
//!
//! OGC services treat KVP parameter names case-insensitively, so keys are
//! normalized to upper case on insertion. The untouched pairs a client sent
//! are kept separately as a [`RawKvp`] map.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw parameters exactly as received (original key case, undecoded values).
pub type RawKvp = BTreeMap<String, String>;

/// Side-channel key carrying the stored copy of an index request document.
pub const POST_REQUEST: &str = "POST_REQUEST";

/// Side-channel flag marking a request that was rewritten from `resultType=index`.
pub const RESULT_TYPE_INDEX: &str = "RESULT_TYPE_INDEX";

/// Parameter naming a stored result set.
pub const RESULT_SET_ID: &str = "RESULTSETID";

/// Case-insensitive KVP parameter map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KvpMap {
    entries: BTreeMap<String, String>,
}

impl KvpMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a normalized map from raw pairs. Later duplicates win.
    pub fn from_raw(raw: &RawKvp) -> Self {
        let mut map = Self::new();
        for (key, value) in raw {
            map.insert(key, value.clone());
        }
        map
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .insert(key.trim().to_uppercase(), value.into().trim().to_string());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(&key.to_uppercase())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&key.to_uppercase()).map(String::as_str)
    }

    /// Get a value, treating an empty string as absent.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    /// First non-empty value among several aliases (e.g. `TYPENAMES` / `TYPENAME`).
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get_non_empty(k))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_uppercase())
    }

    /// Overlay `other` on top of this map; values in `other` win.
    pub fn merged_with(mut self, other: &KvpMap) -> Self {
        for (key, value) in &other.entries {
            self.entries.insert(key.clone(), value.clone());
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for KvpMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = KvpMap::new();
        for (key, value) in iter {
            map.insert(key.as_ref(), value);
        }
        map
    }
}

/// Read a boolean flag the way OGC services spell them.
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_lowercase()).as_deref(),
        Some("true") | Some("1") | Some("yes")
    )
}
