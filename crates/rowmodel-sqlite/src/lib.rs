//! SQLite backend for rowmodel.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! This crate provides a SQLite backing store built on the bundled
//! libsqlite3. It implements the `Backend` trait from rowmodel-core, so a
//! `Driver` can reflect its tables, select rows and insert records.
//!
//! # Example
//!
//! ```rust
//! use rowmodel_core::{Backend, SelectQuery, Value};
//! use rowmodel_sqlite::SqliteConnection;
//!
//! let conn = SqliteConnection::open_memory().unwrap();
//! conn.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
//! conn.execute("INSERT INTO users (name) VALUES (?)", &[Value::from("Alice")]).unwrap();
//!
//! let headers = conn.reflect().unwrap();
//! assert_eq!(headers[0].columns, ["id", "name"]);
//!
//! let rows = conn.select(&SelectQuery::new("users")).unwrap();
//! assert_eq!(rows, vec![vec![Value::Int(1), Value::from("Alice")]]);
//! ```
//!
//! # Type Mapping
//!
//! | Value | SQLite Type |
//! |-------|-------------|
//! | `Bool` | INTEGER (0/1) |
//! | `Int`, `BigInt` | INTEGER |
//! | `Double` | REAL |
//! | `Text` | TEXT |
//! | `Bytes` | BLOB |
//! | `Json` | TEXT |
//! | `Null` | NULL |
//!
//! Integers read back as `Int` when they fit in 32 bits, else `BigInt`.
//!
//! # Thread Safety
//!
//! `SqliteConnection` is `Send` but not `Sync`: one connection serves one
//! caller at a time.

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};

/// Re-export the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Re-export the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
