//! Core types for rowmodel.
//!
//! This crate provides the pieces a driver builds on:
//!
//! - `Value` and `Row` for data coming from and going to a store
//! - `FieldDef` and the field validation primitive
//! - `Config`, `ModelBuilder`, `ModelSchema` and the `Registry` that checks
//!   model definitions
//! - `Record`, a validated instance of a model, including partial references
//! - `Backend`, the capability a backing store provides

pub mod backend;
pub mod error;
pub mod field;
pub mod identifiers;
pub mod model;
pub mod partial;
pub mod record;
pub mod row;
pub mod validate;
pub mod value;

pub use backend::{Backend, InsertStatement, SelectQuery, TableHeader};
pub use error::{
    ConnectionError, ConnectionErrorKind, Error, FieldValidationError,
    IntegrityError, QueryError, QueryErrorKind, Result, SchemaError, SchemaErrorKind,
    SegmentError, SegmentErrorKind, TransactionError, TransactionErrorKind, TypeError, ValidationError, ValidationErrorKind,
};
pub use field::{FieldDef, FieldType};
pub use identifiers::{quote_ident, quote_ident_list};
pub use model::{Config, ConfigSource, ModelBuilder, ModelSchema, Registry};
pub use record::{DumpOptions, FieldInput, FieldValue, Record};
pub use row::{ColumnInfo, Row};
pub use validate::{coerce, matches_pattern, validate_field, validate_pattern};
pub use value::Value;
