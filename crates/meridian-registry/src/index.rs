//! Insertion-ordered unique index.
//!
//! [`OrderedUniqueIndex`] maps identifiers to values and iterates values in
//! insertion order. It backs both the live membership of a collection and its
//! three pending change sets.

use std::borrow::Borrow;
use std::hash::Hash;

use indexmap::IndexMap;

/// An ordered mapping from identifier to value with unique keys.
///
/// Overwriting an existing key keeps its position; removal preserves the
/// relative order of the remaining entries.
#[derive(Debug, Clone)]
pub struct OrderedUniqueIndex<K, V> {
    entries: IndexMap<K, V>,
}

impl<K: Hash + Eq, V> OrderedUniqueIndex<K, V> {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Look up the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    /// Store `value` under `key`, overwriting in place if present, otherwise
    /// appending.
    pub fn set(&mut self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    /// Remove `key`. Returns `true` if it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.take(key).is_some()
    }

    /// Remove `key` and return its value.
    pub fn take<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.shift_remove(key)
    }

    /// Whether `key` is present.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Remove every entry.
    pub fn remove_all(&mut self) {
        self.entries.clear();
    }

    /// Iterate over the current values in order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }

    /// Iterate over `(key, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Hash + Eq, V: Clone> OrderedUniqueIndex<K, V> {
    /// Copy the current values, in order, into a vector.
    pub fn to_vec(&self) -> Vec<V> {
        self.entries.values().cloned().collect()
    }
}

impl<K: Hash + Eq, V> Default for OrderedUniqueIndex<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
