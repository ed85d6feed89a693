//! Insertion-ordered dictionaries with mutation versioning.
//!
//! Dictionary iteration order is observable in the traced language, so
//! guards over key sequences are order-sensitive. Every mutation bumps an
//! internal version counter; DICT_VERSION-style conditions compare it.

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::value::Value;

struct DictData {
    entries: IndexMap<String, Value>,
    version: u64,
}

/// Shared, insertion-ordered dictionary value.
///
/// Clones share the same underlying storage (and identity).
#[derive(Clone)]
pub struct DictValue(Arc<RwLock<DictData>>);

impl DictValue {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self(Arc::new(RwLock::new(DictData {
            entries: IndexMap::new(),
            version: 0,
        })))
    }

    /// Create a dictionary from entries, preserving their order.
    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let dict = Self::new();
        for (key, value) in entries {
            dict.insert(key, value);
        }
        dict
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.read().entries.get(key).cloned()
    }

    /// Insert or overwrite an entry. Bumps the version either way.
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        let mut data = self.0.write();
        data.entries.insert(key.into(), value);
        data.version += 1;
    }

    /// Remove an entry, preserving the order of the remaining keys.
    /// Bumps the version if the key was present.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut data = self.0.write();
        let removed = data.entries.shift_remove(key);
        if removed.is_some() {
            data.version += 1;
        }
        removed
    }

    /// Check key membership.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.read().entries.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0.read().entries.keys().cloned().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.read().entries.len()
    }

    /// Check whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.0.read().entries.is_empty()
    }

    /// Current mutation version.
    #[inline]
    pub fn version(&self) -> u64 {
        self.0.read().version
    }

    /// Stable address of the shared storage, for identity conditions.
    #[inline]
    pub(crate) fn data_ptr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl Default for DictValue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DictValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.0.read();
        f.debug_struct("DictValue")
            .field("keys", &data.entries.keys().collect::<Vec<_>>())
            .field("version", &data.version)
            .finish()
    }
}

/// Read-only view over a shared dictionary (mapping proxy).
///
/// The view exposes no mutation API, but it observes mutations made
/// through the underlying dictionary.
#[derive(Clone)]
pub struct MappingView(DictValue);

impl MappingView {
    /// Wrap a dictionary in a read-only view.
    pub fn new(dict: DictValue) -> Self {
        Self(dict)
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.get(key)
    }

    /// Check key membership.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0.keys()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the view is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identity of the underlying dictionary.
    #[inline]
    pub(crate) fn data_ptr(&self) -> usize {
        self.0.data_ptr()
    }
}

impl std::fmt::Debug for MappingView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MappingView({:?})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_preserve_insertion_order() {
        let d = DictValue::from_entries([("b", Value::int(1)), ("a", Value::int(2))]);
        assert_eq!(d.keys(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn mutations_bump_version() {
        let d = DictValue::new();
        let v0 = d.version();

        d.insert("k", Value::int(1));
        let v1 = d.version();
        assert!(v1 > v0);

        // Overwrite counts as a mutation too
        d.insert("k", Value::int(2));
        assert!(d.version() > v1);

        // Removing a missing key does not
        let v2 = d.version();
        assert!(d.remove("missing").is_none());
        assert_eq!(d.version(), v2);
    }

    #[test]
    fn view_observes_underlying_mutations() {
        let d = DictValue::from_entries([("a", Value::int(1))]);
        let view = MappingView::new(d.clone());

        assert!(view.contains_key("a"));
        d.insert("b", Value::int(2));
        assert_eq!(view.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn clones_share_storage() {
        let d = DictValue::new();
        let e = d.clone();
        d.insert("x", Value::int(1));
        assert!(e.contains_key("x"));
        assert_eq!(d.data_ptr(), e.data_ptr());
    }
}
