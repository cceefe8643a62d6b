//! In-memory backend and model fixtures for driver unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use rowmodel_core::{
    Backend, Config, ConnectionError, ConnectionErrorKind, Error, FieldDef, InsertStatement,
    ModelBuilder, ModelSchema, QueryError, QueryErrorKind, Registry, Result, SelectQuery,
    TableHeader, Value,
};

#[derive(Debug, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

/// A `Backend` over in-memory tables that can be told to fail.
///
/// Selects ignore the condition and honor the limit. Inserted rows stay
/// pending until commit.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RefCell<BTreeMap<String, Table>>,
    pending: RefCell<Vec<(String, Vec<Value>)>>,
    log: RefCell<Vec<String>>,
    reflect_calls: Cell<usize>,
    inserts: Cell<usize>,
    fail_reflect: bool,
    fail_select: bool,
    fail_inserts: HashSet<usize>,
    last_select: RefCell<Option<SelectQuery>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(self, name: &str, columns: &[&str]) -> Self {
        self.tables.borrow_mut().insert(
            name.to_string(),
            Table {
                columns: columns.iter().map(ToString::to_string).collect(),
                rows: Vec::new(),
            },
        );
        self
    }

    pub fn row(self, table: &str, values: Vec<Value>) -> Self {
        if let Some(t) = self.tables.borrow_mut().get_mut(table) {
            t.rows.push(values);
        }
        self
    }

    pub fn fail_reflect(mut self) -> Self {
        self.fail_reflect = true;
        self
    }

    pub fn fail_select(mut self) -> Self {
        self.fail_select = true;
        self
    }

    /// Fail the insert with this 0-based call index.
    pub fn fail_insert_at(mut self, index: usize) -> Self {
        self.fail_inserts.insert(index);
        self
    }

    pub fn reflect_calls(&self) -> usize {
        self.reflect_calls.get()
    }

    pub fn rows(&self, table: &str) -> Vec<Vec<Value>> {
        self.tables
            .borrow()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Every transaction call and insert, in order.
    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn last_select(&self) -> Option<SelectQuery> {
        self.last_select.borrow().clone()
    }

    fn query_error(message: &str) -> Error {
        Error::Query(QueryError {
            kind: QueryErrorKind::Database,
            sql: None,
            message: message.to_string(),
            source: None,
        })
    }
}

impl Backend for MemoryBackend {
    fn reflect(&self) -> Result<Vec<TableHeader>> {
        self.reflect_calls.set(self.reflect_calls.get() + 1);
        if self.fail_reflect {
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Disconnected,
                message: "store is gone".to_string(),
                source: None,
            }));
        }
        Ok(self
            .tables
            .borrow()
            .iter()
            .map(|(name, t)| TableHeader::new(name.clone(), t.columns.clone()))
            .collect())
    }

    fn select(&self, query: &SelectQuery) -> Result<Vec<Vec<Value>>> {
        *self.last_select.borrow_mut() = Some(query.clone());
        if self.fail_select {
            return Err(Self::query_error("select failed"));
        }
        let tables = self.tables.borrow();
        let table = tables
            .get(&query.table)
            .ok_or_else(|| Self::query_error("no such table"))?;
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(table.rows.iter().take(limit).cloned().collect())
    }

    fn insert(&self, statement: &InsertStatement) -> Result<u64> {
        let index = self.inserts.get();
        self.inserts.set(index + 1);
        self.log.borrow_mut().push(format!("insert {index}"));
        if self.fail_inserts.contains(&index) {
            return Err(Self::query_error("insert failed"));
        }
        let tables = self.tables.borrow();
        let table = tables
            .get(&statement.table)
            .ok_or_else(|| Self::query_error("no such table"))?;
        let row = table
            .columns
            .iter()
            .map(|c| {
                statement
                    .columns
                    .iter()
                    .position(|s| s == c)
                    .map_or(Value::Null, |i| statement.values[i].clone())
            })
            .collect();
        self.pending
            .borrow_mut()
            .push((statement.table.clone(), row));
        Ok(1)
    }

    fn begin(&self) -> Result<()> {
        self.log.borrow_mut().push("begin".to_string());
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.log.borrow_mut().push("commit".to_string());
        let mut tables = self.tables.borrow_mut();
        for (table, row) in self.pending.borrow_mut().drain(..) {
            if let Some(t) = tables.get_mut(&table) {
                t.rows.push(row);
            }
        }
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.log.borrow_mut().push("rollback".to_string());
        self.pending.borrow_mut().clear();
        Ok(())
    }
}

pub fn define_user(registry: &mut Registry) -> Arc<ModelSchema> {
    registry
        .define(
            ModelBuilder::new("User")
                .field(FieldDef::int("id"))
                .field(FieldDef::text("name").max_length(16))
                .config(Config::new("id")),
        )
        .unwrap()
}

/// `User { id: int, name: text <= 16 }`, keyed by `id`.
pub fn user_model() -> Arc<ModelSchema> {
    define_user(&mut Registry::new())
}

/// `User` and `Post` from one registry, so `Post.author` targets this `User`.
pub fn blog_models() -> (Arc<ModelSchema>, Arc<ModelSchema>) {
    let post = post_model();
    let user = post
        .partial_target("author")
        .map(Arc::clone)
        .unwrap();
    (user, post)
}

/// `Post { id: int, title: text, author: partial User }`.
pub fn post_model() -> Arc<ModelSchema> {
    let mut registry = Registry::new();
    define_user(&mut registry);
    registry
        .define(
            ModelBuilder::new("Post")
                .field(FieldDef::int("id"))
                .field(FieldDef::text("title"))
                .field(FieldDef::partial("author", "User"))
                .config(Config::new("id").partial("author", "users")),
        )
        .unwrap()
}
