//! Error types for rowmodel operations.

use std::fmt;

/// The primary error type for all rowmodel operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (open, close)
    Connection(ConnectionError),
    /// Query execution errors raised by a backend
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Transaction errors
    Transaction(TransactionError),
    /// Model definition errors, raised when a model is declared
    Schema(SchemaError),
    /// Validation errors, raised when a record is built
    Validation(ValidationError),
    /// A model does not structurally fit the table it is exported to
    Integrity(IntegrityError),
    /// A cache segment rejected an operation
    Segment(SegmentError),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Connection lost or already closed
    Disconnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, not null, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied or read-only store
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Store is busy or locked
    Busy,
    /// Interrupted
    Cancelled,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// A transaction is already open on this connection
    AlreadyActive,
    /// No transaction is open on this connection
    NotActive,
}

/// Raised while a model is being defined. A model that fails these checks
/// never becomes usable.
#[derive(Debug)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    /// The model the error was raised for
    pub model: String,
    pub message: String,
    /// Field names involved, when the error concerns specific fields
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// No configuration was supplied
    MissingConfig,
    /// The raw configuration mapping could not be read
    InvalidConfig,
    /// A partial field refers to something that is not a defined model
    InvalidPartialTarget,
    /// Partial fields without an entry in `Config::partials`
    MissingPartials,
    /// `Config::partials` entries that name no partial field
    UnknownPartials,
    /// `Config::search_by` names no declared field
    UnknownSearchKey,
    /// The same field name was declared twice
    DuplicateField,
    /// A field constraint pattern is not a valid regex
    InvalidPattern,
    /// A model with the same name is already defined
    DuplicateModel,
    /// A table was not present when the store was reflected
    TableNotFound,
    /// Export include/exclude sets leave no column of the table
    EmptyProjection,
}

/// A cache segment or its manager rejected an operation.
#[derive(Debug)]
pub struct SegmentError {
    pub kind: SegmentErrorKind,
    /// The segment the error was raised for
    pub segment: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentErrorKind {
    /// The segment is at capacity and may not evict
    Full,
    /// An entry with the same key is already stored
    DuplicateKey,
    /// No entry has the given key
    KeyNotFound,
    /// No segment has the given name
    UnknownSegment,
    /// A segment with the same name is already managed
    DuplicateSegment,
    /// A search names a field the segment's model does not declare
    UnknownField,
    /// A search expression is not a valid regex
    InvalidPattern,
}

/// The model bound to a location cannot hold every column of its table.
#[derive(Debug)]
pub struct IntegrityError {
    pub location: String,
    pub table: String,
    /// None when no model is bound at all
    pub model: Option<String>,
    /// Table columns the model does not declare
    pub missing_fields: Vec<String>,
}

/// Validation error for field-level and model-level validation.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The errors grouped by field name (or "__model__" for model-level)
    pub errors: Vec<FieldValidationError>,
}

/// A single validation error for a field.
#[derive(Debug, Clone)]
pub struct FieldValidationError {
    /// The field name that failed validation
    pub field: String,
    /// The kind of validation that failed
    pub kind: ValidationErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Underlying error, set when a partial reference failed against the
    /// target model's primary key field
    pub cause: Option<Box<FieldValidationError>>,
}

/// The type of validation constraint that was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Value could not be coerced to the field type
    Type,
    /// Value is below minimum
    Min,
    /// Value is above maximum
    Max,
    /// Value is shorter than minimum length
    MinLength,
    /// Value is longer than maximum length
    MaxLength,
    /// Value doesn't match regex pattern
    Pattern,
    /// Required field is missing/null
    Required,
    /// A partial reference could not be resolved to a primary key
    Reference,
    /// Model-level validation failed
    Model,
}

impl ValidationError {
    /// Create a new empty validation error container.
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Check if there are any validation errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add a field validation error.
    pub fn add(
        &mut self,
        field: impl Into<String>,
        kind: ValidationErrorKind,
        message: impl Into<String>,
    ) {
        self.errors.push(FieldValidationError::new(field, kind, message));
    }

    /// Add an already-built field error.
    pub fn push(&mut self, error: FieldValidationError) {
        self.errors.push(error);
    }

    /// Add a type coercion error.
    pub fn add_type(&mut self, field: impl Into<String>, expected: &str, actual: &str) {
        self.push(FieldValidationError::type_mismatch(field, expected, actual));
    }

    /// Add a min value error.
    pub fn add_min(
        &mut self,
        field: impl Into<String>,
        min: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) {
        self.add(
            field,
            ValidationErrorKind::Min,
            format!("must be at least {min}, got {actual}"),
        );
    }

    /// Add a max value error.
    pub fn add_max(
        &mut self,
        field: impl Into<String>,
        max: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) {
        self.add(
            field,
            ValidationErrorKind::Max,
            format!("must be at most {max}, got {actual}"),
        );
    }

    /// Add a min length error.
    pub fn add_min_length(&mut self, field: impl Into<String>, min: usize, actual: usize) {
        self.add(
            field,
            ValidationErrorKind::MinLength,
            format!("must be at least {min} characters, got {actual}"),
        );
    }

    /// Add a max length error.
    pub fn add_max_length(&mut self, field: impl Into<String>, max: usize, actual: usize) {
        self.add(
            field,
            ValidationErrorKind::MaxLength,
            format!("must be at most {max} characters, got {actual}"),
        );
    }

    /// Add a pattern match error.
    pub fn add_pattern(&mut self, field: impl Into<String>, pattern: &str) {
        self.add(
            field,
            ValidationErrorKind::Pattern,
            format!("must match pattern '{pattern}'"),
        );
    }

    /// Add a required field error.
    pub fn add_required(&mut self, field: impl Into<String>) {
        self.push(FieldValidationError::required(field));
    }

    /// Add a model-level validation error, recorded with field "__model__".
    pub fn add_model_error(&mut self, message: impl Into<String>) {
        self.add("__model__", ValidationErrorKind::Model, message);
    }

    /// Errors recorded for one field.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldValidationError> {
        self.errors.iter().filter(move |e| e.field == field)
    }

    /// Convert to Result, returning Ok(()) if no errors, Err(self) otherwise.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Default for ValidationError {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldValidationError {
    /// A single error with no cause.
    pub fn new(
        field: impl Into<String>,
        kind: ValidationErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
            cause: None,
        }
    }

    /// The field is missing or NULL.
    pub fn required(field: impl Into<String>) -> Self {
        Self::new(field, ValidationErrorKind::Required, "is required")
    }

    /// The value could not be coerced to `expected`.
    pub fn type_mismatch(field: impl Into<String>, expected: &str, actual: &str) -> Self {
        Self::new(
            field,
            ValidationErrorKind::Type,
            format!("expected {expected}, got {actual}"),
        )
    }

    /// Wrap `cause` in a reference error scoped to `field`.
    pub fn reference(
        field: impl Into<String>,
        target: &str,
        cause: FieldValidationError,
    ) -> Self {
        Self {
            field: field.into(),
            kind: ValidationErrorKind::Reference,
            message: format!(
                "not a valid {target} reference: {}: {}",
                cause.field, cause.message
            ),
            cause: Some(Box::new(cause)),
        }
    }
}

impl SchemaError {
    pub fn new(kind: SchemaErrorKind, model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Attach the field names the error concerns.
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }
}

impl Error {
    /// Is this an error raised by the backing store while running an operation?
    ///
    /// These are the errors fetch and export absorb instead of propagating.
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            Error::Query(_) | Error::Connection(_) | Error::Transaction(_)
        )
    }

    /// Is this a model definition error?
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Error::Schema(_))
    }

    /// Kind of the schema error, if this is one.
    pub fn schema_kind(&self) -> Option<SchemaErrorKind> {
        match self {
            Error::Schema(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Kind of the segment error, if this is one.
    pub fn segment_kind(&self) -> Option<SegmentErrorKind> {
        match self {
            Error::Segment(e) => Some(e.kind),
            _ => None,
        }
    }

    /// The validation errors, if this is a validation failure.
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl QueryError {
    /// Is this a constraint violation?
    pub fn is_constraint_violation(&self) -> bool {
        self.kind == QueryErrorKind::Constraint
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => write!(f, "Type error: {e}"),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Schema(e) => write!(f, "Schema error: {e}"),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Integrity(e) => write!(f, "Integrity error: {e}"),
            Error::Segment(e) => write!(f, "Segment error: {e}"),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model '{}': {}", self.model, self.message)
    }
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment '{}': {}", self.segment, self.message)
    }
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            None => write!(
                f,
                "no model bound for location '{}' (table '{}')",
                self.location, self.table
            ),
            Some(model) => write!(
                f,
                "model '{}' does not fit table '{}': missing fields {}",
                model,
                self.table,
                self.missing_fields.join(", ")
            ),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "validation passed")
        } else if self.errors.len() == 1 {
            let err = &self.errors[0];
            write!(f, "validation error on '{}': {}", err.field, err.message)
        } else {
            writeln!(f, "validation errors:")?;
            for err in &self.errors {
                writeln!(f, "  - {}: {}", err.field, err.message)?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<SegmentError> for Error {
    fn from(err: SegmentError) -> Self {
        Error::Segment(err)
    }
}

impl From<IntegrityError> for Error {
    fn from(err: IntegrityError) -> Self {
        Error::Integrity(err)
    }
}

/// Result type alias for rowmodel operations.
pub type Result<T> = std::result::Result<T, Error>;
