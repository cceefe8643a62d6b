//! Logical location keys and the physical tables they name.

use std::collections::HashMap;

/// Bidirectional mapping between location keys and table names.
///
/// The reverse map is rebuilt from scratch after every update, so it is
/// always the inverse of the forward map. When two keys name the same
/// table, the reverse entry points at the key applied last.
#[derive(Debug, Clone, Default)]
pub struct LocationMap {
    maps: HashMap<String, String>,
    /// Keys of `maps`, oldest application first
    order: Vec<String>,
    rev_map: HashMap<String, String>,
}

impl LocationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `pairs` into the map, then rebuild the reverse map.
    pub fn extend<K, V>(&mut self, pairs: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, table) in pairs {
            let key = key.into();
            self.order.retain(|k| *k != key);
            self.order.push(key.clone());
            self.maps.insert(key, table.into());
        }
        self.rebuild_reverse();
    }

    pub fn insert(&mut self, key: impl Into<String>, table: impl Into<String>) {
        self.extend([(key.into(), table.into())]);
    }

    /// The table a key is mapped to.
    pub fn table_for(&self, key: &str) -> Option<&str> {
        self.maps.get(key).map(String::as_str)
    }

    /// The key a table is mapped from.
    pub fn key_for(&self, table: &str) -> Option<&str> {
        self.rev_map.get(table).map(String::as_str)
    }

    /// The physical table for a location: its mapping, or the location itself.
    pub fn resolve<'a>(&'a self, location: &'a str) -> &'a str {
        self.table_for(location).unwrap_or(location)
    }

    /// `(key, table)` pairs in the order they were last applied.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .filter_map(|k| self.maps.get(k).map(|t| (k.as_str(), t.as_str())))
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    fn rebuild_reverse(&mut self) {
        self.rev_map = self
            .order
            .iter()
            .filter_map(|k| self.maps.get(k).map(|t| (t.clone(), k.clone())))
            .collect();
    }
}
