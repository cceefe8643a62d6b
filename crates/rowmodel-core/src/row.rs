//! Named row representation.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Column metadata shared across all rows built from one header.
///
/// This struct is wrapped in `Arc` so all rows zipped against the same table
/// header share the same column information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column names in order
    names: Vec<String>,
    /// Name -> index mapping for O(1) lookup
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create new column info from a list of column names.
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Check if a column exists.
    pub fn contains(&self, name: &str) -> bool {
        self.name_to_index.contains_key(name)
    }

    /// Get all column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A row of values addressed by column name.
///
/// Rows provide both index-based and name-based access to column values.
/// Column metadata is shared via `Arc`.
#[derive(Debug, Clone)]
pub struct Row {
    /// Column values in order
    values: Vec<Value>,
    /// Shared column metadata
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with the given columns and values.
    ///
    /// For multiple rows sharing a header, prefer `with_columns`.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a new row with shared column metadata.
    ///
    /// Surplus values beyond the header are dropped; missing trailing values
    /// are left out, so `len()` is never larger than the header.
    pub fn with_columns(columns: Arc<ColumnInfo>, mut values: Vec<Value>) -> Self {
        values.truncate(columns.len());
        Self { values, columns }
    }

    /// Build a row from ordered `(name, value)` pairs.
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        let (names, values): (Vec<String>, Vec<Value>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self::new(names, values)
    }

    /// Get the shared column metadata.
    pub fn column_info(&self) -> Arc<ColumnInfo> {
        Arc::clone(&self.columns)
    }

    /// Get the number of populated columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if this row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index. O(1) operation.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name. O(1) operation via HashMap lookup.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Check if a column exists by name.
    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Get a typed value by column name.
    #[allow(clippy::result_large_err)]
    pub fn get_named<T>(&self, name: &str) -> Result<T>
    where
        T: TryFrom<Value, Error = Error>,
    {
        let value = self.get_by_name(name).ok_or_else(|| {
            Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: format!("column '{}' not found", name),
                column: Some(name.to_string()),
            })
        })?;
        T::try_from(value.clone()).map_err(|e| match e {
            Error::Type(mut te) => {
                te.column = Some(name.to_string());
                Error::Type(te)
            }
            e => e,
        })
    }

    /// Get all column names.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    /// Consume the row, returning its values in column order.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Iterate over (column_name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Render the row as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.iter()
                .map(|(name, value)| (name.to_string(), value.to_json()))
                .collect(),
        )
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_info() {
        let info = ColumnInfo::new(vec!["id".to_string(), "name".to_string()]);
        assert_eq!(info.len(), 2);
        assert_eq!(info.index_of("name"), Some(1));
        assert!(info.contains("id"));
        assert!(!info.contains("email"));
    }

    #[test]
    fn test_row_access() {
        let row = Row::new(
            vec!["id".to_string(), "name".to_string()],
            vec![Value::Int(1), Value::Text("Alice".to_string())],
        );
        assert_eq!(row.get(0), Some(&Value::Int(1)));
        assert_eq!(
            row.get_by_name("name"),
            Some(&Value::Text("Alice".to_string()))
        );
        assert_eq!(row.get_named::<i64>("id").unwrap(), 1);
        assert_eq!(row.get_named::<String>("name").unwrap(), "Alice");
    }

    #[test]
    fn test_get_named_missing_column() {
        let row = Row::from_pairs([("id", Value::Int(1))]);
        match row.get_named::<i64>("email") {
            Err(Error::Type(te)) => assert_eq!(te.column.as_deref(), Some("email")),
            other => panic!("expected type error, got {other:?}"),
        }
    }

    #[test]
    fn test_shared_columns_truncate_surplus() {
        let columns = Arc::new(ColumnInfo::new(vec!["a".to_string()]));
        let row = Row::with_columns(Arc::clone(&columns), vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(row.len(), 1);
        assert!(Arc::ptr_eq(&row.column_info(), &columns));
    }

    #[test]
    fn test_row_equality_is_by_pairs() {
        let a = Row::from_pairs([("id", Value::Int(1)), ("name", Value::from("x"))]);
        let b = Row::new(
            vec!["id".to_string(), "name".to_string()],
            vec![Value::Int(1), Value::from("x")],
        );
        assert_eq!(a, b);
        let c = Row::from_pairs([("name", Value::from("x")), ("id", Value::Int(1))]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_row_to_json() {
        let row = Row::from_pairs([("id", Value::Int(1)), ("name", Value::Null)]);
        assert_eq!(row.to_json(), serde_json::json!({"id": 1, "name": null}));
    }
}
