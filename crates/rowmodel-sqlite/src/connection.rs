//! SQLite connection implementation.
//!
//! This module provides safe wrappers around SQLite's C API and implements
//! the `Backend` trait from rowmodel-core.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::result_large_err)] // Error type is defined in rowmodel-core
#![allow(clippy::borrow_as_ptr)] // FFI requires raw pointers

use crate::ffi;
use crate::types;
use rowmodel_core::{
    Backend, ColumnInfo, Error, InsertStatement, Row, SelectQuery, TableHeader, Value,
    error::{
        ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind, TransactionError,
        TransactionErrorKind,
    },
    quote_ident,
};
use std::cell::Cell;
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::Arc;

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open in multi-thread mode.
    pub no_mutex: bool,
    /// Open in serialized mode.
    pub full_mutex: bool,
    /// Enable shared cache mode.
    pub shared_cache: bool,
    /// Disable shared cache mode.
    pub private_cache: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.no_mutex {
            flags |= ffi::SQLITE_OPEN_NOMUTEX;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }
        if self.shared_cache {
            flags |= ffi::SQLITE_OPEN_SHAREDCACHE;
        }
        if self.private_cache {
            flags |= ffi::SQLITE_OPEN_PRIVATECACHE;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

/// A connection to a SQLite database.
///
/// The connection owns its handle and is used from one thread at a time:
/// it can be moved to another thread but not shared.
pub struct SqliteConnection {
    db: *mut ffi::sqlite3,
    in_transaction: Cell<bool>,
    path: String,
}

// SAFETY: the handle is owned exclusively by this value, and `Cell` keeps
// the type `!Sync`, so it is never used from two threads at once.
unsafe impl Send for SqliteConnection {}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .field("in_transaction", &self.in_transaction.get())
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self, Error> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: "Invalid path: contains null byte".to_string(),
                source: None,
            })
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is valid, errmsg returns a valid C string
                unsafe {
                    let msg = errmsg(db);
                    ffi::sqlite3_close(db);
                    msg
                }
            };

            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: format!("Failed to open database: {}", msg),
                source: None,
            }));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
        }

        tracing::debug!(path = %config.path, "opened sqlite database");
        Ok(Self {
            db,
            in_transaction: Cell::new(false),
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, Error> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self, Error> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Is a transaction open on this connection?
    pub fn in_transaction(&self) -> bool {
        self.in_transaction.get()
    }

    /// Execute SQL directly without preparing (for DDL, etc.)
    pub fn execute_raw(&self, sql: &str) -> Result<(), Error> {
        let c_sql = CString::new(sql).map_err(|_| null_byte_error(sql))?;
        let mut errmsg_ptr: *mut std::ffi::c_char = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_exec(
                self.db,
                c_sql.as_ptr(),
                None,
                ptr::null_mut(),
                &mut errmsg_ptr,
            )
        };

        if rc != ffi::SQLITE_OK {
            let msg = if errmsg_ptr.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: errmsg_ptr was allocated by sqlite3_exec
                unsafe {
                    let msg = CStr::from_ptr(errmsg_ptr).to_string_lossy().into_owned();
                    ffi::sqlite3_free(errmsg_ptr.cast());
                    msg
                }
            };

            return Err(Error::Query(QueryError {
                kind: error_code_to_kind(rc),
                sql: Some(sql.to_string()),
                message: msg,
                source: None,
            }));
        }

        Ok(())
    }

    /// Get the number of rows changed by the last statement.
    pub fn changes(&self) -> i32 {
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_changes(self.db) }
    }

    /// Prepare and execute a query, returning all rows.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let (columns, rows) = self.query_values(sql, params)?;
        Ok(rows
            .into_iter()
            .map(|values| Row::with_columns(Arc::clone(&columns), values))
            .collect())
    }

    /// Prepare and execute a statement, returning rows affected.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        tracing::trace!(sql, params = params.len(), "execute");
        let stmt = Statement::prepare(self.db, sql)?;
        stmt.bind_all(params)?;

        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_step(stmt.raw) };
        match rc {
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => Ok(self.changes() as u64),
            _ => Err(step_error(self.db, sql)),
        }
    }

    /// Begin a transaction.
    pub fn begin(&self) -> Result<(), Error> {
        if self.in_transaction.get() {
            return Err(Error::Transaction(TransactionError {
                kind: TransactionErrorKind::AlreadyActive,
                message: "Already in a transaction".to_string(),
            }));
        }
        self.execute_raw("BEGIN")?;
        self.in_transaction.set(true);
        tracing::trace!(path = %self.path, "BEGIN");
        Ok(())
    }

    /// Commit the current transaction.
    pub fn commit(&self) -> Result<(), Error> {
        self.finish("COMMIT")
    }

    /// Rollback the current transaction.
    pub fn rollback(&self) -> Result<(), Error> {
        self.finish("ROLLBACK")
    }

    fn finish(&self, verb: &str) -> Result<(), Error> {
        if !self.in_transaction.get() {
            return Err(Error::Transaction(TransactionError {
                kind: TransactionErrorKind::NotActive,
                message: "Not in a transaction".to_string(),
            }));
        }
        let result = self.execute_raw(verb);
        // A failed COMMIT can leave SQLite in autocommit mode; only a
        // successful statement or a rollback ends the transaction here.
        if result.is_ok() || verb == "ROLLBACK" {
            self.in_transaction.set(false);
        }
        tracing::trace!(path = %self.path, "{verb}");
        result
    }

    /// Run a query and return its column names and positional rows.
    fn query_values(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<(Arc<ColumnInfo>, Vec<Vec<Value>>), Error> {
        tracing::trace!(sql, params = params.len(), "query");
        let stmt = Statement::prepare(self.db, sql)?;
        stmt.bind_all(params)?;

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt.raw) };
        let mut col_names = Vec::with_capacity(col_count as usize);
        for i in 0..col_count {
            // SAFETY: stmt is valid, i is in range
            let name = unsafe { types::column_name(stmt.raw, i) }.unwrap_or_else(|| format!("col{i}"));
            col_names.push(name);
        }
        let columns = Arc::new(ColumnInfo::new(col_names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            let rc = unsafe { ffi::sqlite3_step(stmt.raw) };
            match rc {
                ffi::SQLITE_ROW => {
                    let mut values = Vec::with_capacity(col_count as usize);
                    for i in 0..col_count {
                        // SAFETY: stmt is valid, we just got SQLITE_ROW
                        values.push(unsafe { types::read_column(stmt.raw, i) });
                    }
                    rows.push(values);
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(step_error(self.db, sql)),
            }
        }

        Ok((columns, rows))
    }
}

impl Backend for SqliteConnection {
    /// User tables in name order. SQLite's internal tables are skipped.
    fn reflect(&self) -> Result<Vec<TableHeader>, Error> {
        let tables = self.query(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name",
            &[],
        )?;

        let mut headers = Vec::with_capacity(tables.len());
        for table in tables {
            let Some(Value::Text(name)) = table.get(0) else {
                continue;
            };
            let info = self.query(&format!("PRAGMA table_info({})", quote_ident(name)), &[])?;
            let columns = info
                .iter()
                .filter_map(|col| col.get_by_name("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            headers.push(TableHeader::new(name.clone(), columns));
        }
        Ok(headers)
    }

    fn select(&self, query: &SelectQuery) -> Result<Vec<Vec<Value>>, Error> {
        let (_, rows) = self.query_values(&query.to_sql(), &query.params)?;
        Ok(rows)
    }

    fn insert(&self, statement: &InsertStatement) -> Result<u64, Error> {
        self.execute(&statement.to_sql(), &statement.values)
    }

    fn begin(&self) -> Result<(), Error> {
        SqliteConnection::begin(self)
    }

    fn commit(&self) -> Result<(), Error> {
        SqliteConnection::commit(self)
    }

    fn rollback(&self) -> Result<(), Error> {
        SqliteConnection::rollback(self)
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if self.in_transaction.get() {
            let _ = self.execute_raw("ROLLBACK");
        }
        // SAFETY: db is valid and no statements outlive this connection
        unsafe {
            ffi::sqlite3_close(self.db);
        }
    }
}

/// A prepared statement, finalized on drop.
struct Statement<'a> {
    raw: *mut ffi::sqlite3_stmt,
    db: *mut ffi::sqlite3,
    sql: &'a str,
}

impl<'a> Statement<'a> {
    fn prepare(db: *mut ffi::sqlite3, sql: &'a str) -> Result<Self, Error> {
        let c_sql = CString::new(sql).map_err(|_| null_byte_error(sql))?;
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                db,
                c_sql.as_ptr(),
                c_sql.as_bytes().len() as c_int,
                &mut stmt,
                ptr::null_mut(),
            )
        };

        if rc != ffi::SQLITE_OK {
            return Err(step_error(db, sql));
        }
        if stmt.is_null() {
            return Err(Error::Query(QueryError {
                kind: QueryErrorKind::Syntax,
                sql: Some(sql.to_string()),
                message: "empty statement".to_string(),
                source: None,
            }));
        }

        Ok(Self { raw: stmt, db, sql })
    }

    fn bind_all(&self, params: &[Value]) -> Result<(), Error> {
        // SAFETY: stmt is valid
        let expected = unsafe { ffi::sqlite3_bind_parameter_count(self.raw) } as usize;
        if expected != params.len() {
            return Err(Error::Query(QueryError {
                kind: QueryErrorKind::Syntax,
                sql: Some(self.sql.to_string()),
                message: format!("expected {expected} parameters, got {}", params.len()),
                source: None,
            }));
        }

        for (i, param) in params.iter().enumerate() {
            // SAFETY: stmt is valid, index is 1-based
            let rc = unsafe { types::bind_value(self.raw, (i + 1) as c_int, param) };
            if rc != ffi::SQLITE_OK {
                return Err(bind_error(self.db, self.sql, i + 1));
            }
        }
        Ok(())
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        // SAFETY: raw came from sqlite3_prepare_v2 and is finalized once
        unsafe {
            ffi::sqlite3_finalize(self.raw);
        }
    }
}

// Helper functions

/// # Safety
/// `db` must be a valid connection handle.
unsafe fn errmsg(db: *mut ffi::sqlite3) -> String {
    // SAFETY: forwarded from the caller
    unsafe { CStr::from_ptr(ffi::sqlite3_errmsg(db)).to_string_lossy().into_owned() }
}

fn null_byte_error(sql: &str) -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::Syntax,
        sql: Some(sql.to_string()),
        message: "SQL contains null byte".to_string(),
        source: None,
    })
}

fn bind_error(db: *mut ffi::sqlite3, sql: &str, param_index: usize) -> Error {
    // SAFETY: db is valid
    let msg = unsafe { errmsg(db) };

    Error::Query(QueryError {
        kind: QueryErrorKind::Database,
        sql: Some(sql.to_string()),
        message: format!("Failed to bind parameter {}: {}", param_index, msg),
        source: None,
    })
}

fn step_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let (msg, code) = unsafe { (errmsg(db), ffi::sqlite3_errcode(db)) };

    Error::Query(QueryError {
        kind: error_code_to_kind(code),
        sql: Some(sql.to_string()),
        message: msg,
        source: None,
    })
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH | ffi::SQLITE_READONLY => QueryErrorKind::Permission,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
        ffi::SQLITE_INTERRUPT => QueryErrorKind::Cancelled,
        ffi::SQLITE_RANGE => QueryErrorKind::Syntax,
        _ => QueryErrorKind::Database,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> SqliteConnection {
        SqliteConnection::open_memory().unwrap()
    }

    #[test]
    fn test_open_memory() {
        let conn = memory();
        assert_eq!(conn.path(), ":memory:");
        assert!(!conn.in_transaction());
    }

    #[test]
    fn test_execute_raw() {
        let conn = memory();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        conn.execute_raw("INSERT INTO test (name) VALUES ('Alice')")
            .unwrap();
        assert_eq!(conn.changes(), 1);
    }

    #[test]
    fn test_query() {
        let conn = memory();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        conn.execute_raw("INSERT INTO test (name) VALUES ('Alice'), ('Bob')")
            .unwrap();

        let rows = conn.query("SELECT * FROM test ORDER BY id", &[]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get_named::<i64>("id").unwrap(), 1);
        assert_eq!(rows[0].get_named::<String>("name").unwrap(), "Alice");
        assert_eq!(rows[1].get_named::<String>("name").unwrap(), "Bob");
    }

    #[test]
    fn test_parameterized_query() {
        let conn = memory();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
            .unwrap();

        conn.execute(
            "INSERT INTO test (name, age) VALUES (?, ?)",
            &[Value::Text("Alice".to_string()), Value::Int(30)],
        )
        .unwrap();

        let rows = conn
            .query(
                "SELECT * FROM test WHERE name = ?",
                &[Value::Text("Alice".to_string())],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named::<i64>("age").unwrap(), 30);
    }

    #[test]
    fn test_parameter_count_mismatch() {
        let conn = memory();
        conn.execute_raw("CREATE TABLE test (id INTEGER)").unwrap();
        let err = conn
            .query("SELECT * FROM test WHERE id = ?", &[])
            .unwrap_err();
        assert!(matches!(err, Error::Query(ref q) if q.kind == QueryErrorKind::Syntax));
    }

    #[test]
    fn test_null_handling() {
        let conn = memory();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        conn.execute("INSERT INTO test (name) VALUES (?)", &[Value::Null])
            .unwrap();

        let rows = conn.query("SELECT * FROM test", &[]).unwrap();
        assert_eq!(rows[0].get_named::<Option<String>>("name").unwrap(), None);
    }

    #[test]
    fn test_transaction() {
        let conn = memory();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();

        conn.begin().unwrap();
        assert!(matches!(
            conn.begin(),
            Err(Error::Transaction(ref t)) if t.kind == TransactionErrorKind::AlreadyActive
        ));
        conn.execute("INSERT INTO test (name) VALUES (?)", &[Value::from("Alice")])
            .unwrap();
        conn.rollback().unwrap();
        assert!(conn.query("SELECT * FROM test", &[]).unwrap().is_empty());

        conn.begin().unwrap();
        conn.execute("INSERT INTO test (name) VALUES (?)", &[Value::from("Bob")])
            .unwrap();
        conn.commit().unwrap();

        let rows = conn.query("SELECT * FROM test", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named::<String>("name").unwrap(), "Bob");

        assert!(matches!(
            conn.commit(),
            Err(Error::Transaction(ref t)) if t.kind == TransactionErrorKind::NotActive
        ));
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn test_type_conversions() {
        let conn = memory();
        conn.execute_raw("CREATE TABLE types (b BOOLEAN, i INTEGER, f REAL, t TEXT, bl BLOB, j TEXT)")
            .unwrap();

        conn.execute(
            "INSERT INTO types VALUES (?, ?, ?, ?, ?, ?)",
            &[
                Value::Bool(true),
                Value::BigInt(42),
                Value::Double(3.14),
                Value::Text("hello".to_string()),
                Value::Bytes(vec![1, 2, 3]),
                Value::Json(serde_json::json!({"a": 1})),
            ],
        )
        .unwrap();

        let rows = conn.query("SELECT * FROM types", &[]).unwrap();
        let row = &rows[0];
        // SQLite stores booleans as integers
        assert_eq!(row.get_by_name("b"), Some(&Value::Int(1)));
        assert_eq!(row.get_by_name("i"), Some(&Value::Int(42)));
        let f: f64 = row.get_named("f").unwrap();
        assert!((f - 3.14).abs() < 0.001);
        assert_eq!(row.get_by_name("t"), Some(&Value::from("hello")));
        assert_eq!(row.get_by_name("bl"), Some(&Value::Bytes(vec![1, 2, 3])));
        assert_eq!(row.get_by_name("j"), Some(&Value::from("{\"a\":1}")));
    }

    #[test]
    fn test_invalid_utf8_text_is_read_as_bytes() {
        let conn = memory();
        let rows = conn
            .query("SELECT CAST(x'ff61' AS TEXT) AS t, typeof(CAST(x'ff61' AS TEXT)) AS k", &[])
            .unwrap();
        assert_eq!(rows[0].get_by_name("k"), Some(&Value::from("text")));
        assert_eq!(rows[0].get_by_name("t"), Some(&Value::Bytes(vec![0xff, b'a'])));
    }

    #[test]
    fn test_reflect_skips_internal_tables() {
        let conn = memory();
        conn.execute_raw(
            "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT);
             CREATE TABLE \"odd name\" (a, b, c);
             INSERT INTO users (name) VALUES ('x');",
        )
        .unwrap();

        let headers = conn.reflect().unwrap();
        assert_eq!(
            headers,
            vec![
                TableHeader::new("odd name", vec!["a".into(), "b".into(), "c".into()]),
                TableHeader::new("users", vec!["id".into(), "name".into()]),
            ]
        );
    }

    #[test]
    fn test_backend_select_and_insert() {
        let conn = memory();
        conn.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        let stmt = InsertStatement::new(
            "users",
            vec!["id".into(), "name".into()],
            vec![Value::Int(1), Value::from("Ann")],
        );
        assert_eq!(Backend::insert(&conn, &stmt).unwrap(), 1);

        let err = Backend::insert(&conn, &stmt).unwrap_err();
        assert!(matches!(err, Error::Query(ref q) if q.is_constraint_violation()));
        assert_eq!(Backend::insert(&conn, &stmt.clone().replace(true)).unwrap(), 1);

        let rows = conn
            .select(
                &SelectQuery::new("users")
                    .condition("name = ?")
                    .params(vec![Value::from("Ann")]),
            )
            .unwrap();
        assert_eq!(rows, vec![vec![Value::Int(1), Value::from("Ann")]]);
    }

    #[test]
    fn test_open_flags() {
        let tmp = std::env::temp_dir().join("rowmodel_sqlite_flags_test.db");
        let _ = std::fs::remove_file(&tmp);

        let config = SqliteConfig::file(tmp.to_string_lossy().to_string())
            .flags(OpenFlags::create_read_write());
        let conn = SqliteConnection::open(&config).unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER)").unwrap();
        drop(conn);

        let config =
            SqliteConfig::file(tmp.to_string_lossy().to_string()).flags(OpenFlags::read_only());
        let conn = SqliteConnection::open(&config).unwrap();
        assert!(conn.query("SELECT * FROM test", &[]).unwrap().is_empty());

        let err = conn.execute_raw("INSERT INTO test VALUES (1)").unwrap_err();
        assert!(matches!(err, Error::Query(ref q) if q.kind == QueryErrorKind::Permission));

        drop(conn);
        let _ = std::fs::remove_file(&tmp);
    }

    #[test]
    fn test_open_missing_file_read_only() {
        let tmp = std::env::temp_dir().join("rowmodel_sqlite_missing.db");
        let _ = std::fs::remove_file(&tmp);
        let config = SqliteConfig::file(tmp.to_string_lossy().to_string()).flags(OpenFlags::read_only());
        assert!(matches!(
            SqliteConnection::open(&config),
            Err(Error::Connection(ref c)) if c.kind == ConnectionErrorKind::Connect
        ));
    }
}
