//! String field maps attached to samples and sequence frames.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved field names synthesised on sequence export.
pub const FIELD_TIMESTAMP: &str = "Timestamp";
pub const FIELD_UNFILTERED_TIMESTAMP: &str = "UnfilteredTimestamp";
pub const FIELD_FRAME_NUMBER: &str = "FrameNumber";

/// Name → value map of free-form frame fields.
///
/// Insertion order is not significant. Known reserved keys (`Timestamp`,
/// `UnfilteredTimestamp`, `FrameNumber`) are compared case-insensitively
/// via [`FieldMap::get_ci`]; everything else is exact-match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, String>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Case-insensitive lookup, for the reserved sequence-file keys.
    pub fn get_ci(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    /// Remove a field. Returns the previous value if it existed.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Field names in map order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<(String, String)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a FieldMap {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let mut fields = FieldMap::new();
        fields.set("ProbeToTrackerTransform", "1 0 0 0");
        assert_eq!(fields.get("ProbeToTrackerTransform"), Some("1 0 0 0"));
        assert_eq!(fields.remove("ProbeToTrackerTransform"), Some("1 0 0 0".into()));
        assert!(fields.is_empty());
    }

    #[test]
    fn test_case_insensitive_reserved_lookup() {
        let mut fields = FieldMap::new();
        fields.set("TimeStamp", "10.5");
        assert_eq!(fields.get(FIELD_TIMESTAMP), None);
        assert_eq!(fields.get_ci(FIELD_TIMESTAMP), Some("10.5"));
    }
}
