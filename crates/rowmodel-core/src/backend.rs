//! The backing store capability.
//!
//! - [`Backend`] - schema reflection, row selection and transactional inserts
//! - [`SelectQuery`] / [`InsertStatement`] - the two statement shapes a
//!   driver issues, rendered to SQL with quoted identifiers
//!
//! Calls are synchronous and run to completion on the caller's thread. A
//! backend owns one live connection; it is not required to be `Sync`.

use crate::error::Result;
use crate::identifiers::{quote_ident, quote_ident_list};
use crate::value::Value;

/// A table and its ordered column names, as reflected from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHeader {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableHeader {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }
}

/// A row selection against one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    /// Physical table name
    pub table: String,
    /// Raw predicate placed after `WHERE`; `?` placeholders bind `params`
    pub condition: Option<String>,
    /// Positional parameters for the condition or raw statement
    pub params: Vec<Value>,
    /// Maximum number of rows
    pub limit: Option<usize>,
    /// Complete statement used instead of the generated one
    pub raw: Option<String>,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Filter rows with a raw predicate. Empty predicates are ignored.
    #[must_use]
    pub fn condition(mut self, condition: impl Into<String>) -> Self {
        let condition = condition.into();
        self.condition = (!condition.trim().is_empty()).then_some(condition);
        self
    }

    #[must_use]
    pub fn params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    /// Cap the number of rows. Zero means no limit.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = (limit > 0).then_some(limit);
        self
    }

    #[must_use]
    pub fn raw(mut self, sql: impl Into<String>) -> Self {
        self.raw = Some(sql.into());
        self
    }

    /// Render the statement.
    pub fn to_sql(&self) -> String {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        let mut sql = format!("SELECT * FROM {}", quote_ident(&self.table));
        if let Some(condition) = &self.condition {
            sql.push_str(" WHERE ");
            sql.push_str(condition);
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql
    }
}

/// A single-row insert.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Value>,
    /// Replace a row that collides on a unique key instead of failing
    pub replace: bool,
}

impl InsertStatement {
    pub fn new(table: impl Into<String>, columns: Vec<String>, values: Vec<Value>) -> Self {
        Self {
            table: table.into(),
            columns,
            values,
            replace: false,
        }
    }

    #[must_use]
    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    /// Render the statement with one `?` per value.
    pub fn to_sql(&self) -> String {
        let verb = if self.replace {
            "INSERT OR REPLACE"
        } else {
            "INSERT"
        };
        let placeholders = vec!["?"; self.values.len()].join(", ");
        format!(
            "{verb} INTO {} ({}) VALUES ({placeholders})",
            quote_ident(&self.table),
            quote_ident_list(self.columns.iter().map(String::as_str)),
        )
    }
}

/// A backing store that a driver reads from and writes to.
pub trait Backend {
    /// Every user table with its ordered column names.
    fn reflect(&self) -> Result<Vec<TableHeader>>;

    /// Run a selection, returning positional rows.
    fn select(&self, query: &SelectQuery) -> Result<Vec<Vec<Value>>>;

    /// Insert one row, returning the number of rows affected.
    fn insert(&self, statement: &InsertStatement) -> Result<u64>;

    fn begin(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn reflect(&self) -> Result<Vec<TableHeader>> {
        (**self).reflect()
    }

    fn select(&self, query: &SelectQuery) -> Result<Vec<Vec<Value>>> {
        (**self).select(query)
    }

    fn insert(&self, statement: &InsertStatement) -> Result<u64> {
        (**self).insert(statement)
    }

    fn begin(&self) -> Result<()> {
        (**self).begin()
    }

    fn commit(&self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&self) -> Result<()> {
        (**self).rollback()
    }
}
