//! rowmodel - typed record access over tabular stores.
//!
//! rowmodel maps named locations to tables and tables to models, validating
//! rows on the way in and on the way out:
//!
//! - Models are runtime schemas checked once, when they are defined
//! - Partial fields hold another model's primary key and accept either a
//!   record of that model or a bare key value
//! - A [`Driver`] reflects its backend once and runs the fetch and export
//!   pipelines against it
//! - Backend failures during fetch are reported as values, not errors;
//!   during export they roll back only the failing item
//! - A [`Manager`] keeps validated records in named, size-capped
//!   [`Segment`]s and expands partial keys from the segments they name
//!
//! # Quick Start
//!
//! ```rust
//! use rowmodel::prelude::*;
//! use rowmodel_sqlite::SqliteConnection;
//! use serde_json::json;
//!
//! let mut registry = Registry::new();
//! let user = registry
//!     .define(
//!         ModelBuilder::new("User")
//!             .field(FieldDef::int("id"))
//!             .field(FieldDef::text("name"))
//!             .config(json!({"search_by": "id"})),
//!     )
//!     .unwrap();
//!
//! let conn = SqliteConnection::open_memory().unwrap();
//! conn.execute_raw("CREATE TABLE user_table (id INTEGER PRIMARY KEY, name TEXT)")
//!     .unwrap();
//!
//! let mut driver = DriverBuilder::new()
//!     .model("users", user)
//!     .map("users", "user_table")
//!     .build(conn)
//!     .unwrap();
//!
//! let report = driver
//!     .export("users", [json!({"id": "1", "name": "Alice"})], &ExportOptions::new())
//!     .unwrap();
//! assert_eq!(report.committed(), 1);
//!
//! let Fetched::Rows(row) = driver.fetch_one("users", FetchOptions::new()).unwrap() else {
//!     panic!("expected a row");
//! };
//! assert_eq!(row.get("id"), Some(&Value::Int(1)));
//! ```

pub mod driver;
pub mod export;
pub mod fetch;
pub mod location;
pub mod manager;
pub mod segment;

#[cfg(test)]
mod testing;

pub use driver::{Driver, DriverBuilder};
pub use export::{ExportItem, ExportOptions, ExportReport, ItemOutcome};
pub use fetch::{FetchOptions, Fetched, FetchedRow, Records};
pub use location::LocationMap;
pub use manager::Manager;
pub use segment::{DEFAULT_MAX_SIZE, Segment};

pub use rowmodel_core::{
    Backend, ColumnInfo, Config, ConfigSource, DumpOptions, Error, FieldDef, FieldInput,
    FieldType, FieldValidationError, FieldValue, InsertStatement, IntegrityError, ModelBuilder,
    ModelSchema, Record, Registry, Result, Row, SchemaError, SchemaErrorKind, SegmentError,
    SegmentErrorKind, SelectQuery, TableHeader, ValidationError, ValidationErrorKind, Value,
};

/// Common imports.
///
/// ```rust
/// use rowmodel::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        // Models
        Config,
        // Driver
        Driver,
        DriverBuilder,
        Error,
        ExportItem,
        ExportOptions,
        ExportReport,
        FetchOptions,
        Fetched,
        FetchedRow,
        FieldDef,
        FieldInput,
        // Segments
        Manager,
        ModelBuilder,
        ModelSchema,
        Record,
        Registry,
        Result,
        Row,
        Segment,
        Value,
    };
}
