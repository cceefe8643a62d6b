//! Field definitions.

use crate::value::Value;

/// The declared semantic type of a model field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Accept any value unchanged
    Any,
    Bool,
    Int,
    Float,
    Text,
    Bytes,
    Json,
    /// Reference to another model's primary key, named by the model's
    /// registry name. Accepts an instance of that model or a bare key.
    Partial(String),
}

impl FieldType {
    /// Name used in validation messages.
    pub fn describe(&self) -> &str {
        match self {
            FieldType::Any => "any value",
            FieldType::Bool => "boolean",
            FieldType::Int => "integer",
            FieldType::Float => "float",
            FieldType::Text => "text",
            FieldType::Bytes => "bytes",
            FieldType::Json => "json",
            FieldType::Partial(target) => target,
        }
    }

    /// Whether numeric bounds apply to this type.
    pub const fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }
}

/// Metadata and validation rules for one model field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    /// Field name, also the column name it maps to
    pub name: String,
    /// Declared type
    pub field_type: FieldType,
    /// Whether NULL is accepted (a missing value becomes NULL)
    pub nullable: bool,
    /// Value used when the input omits the field
    pub default: Option<Value>,
    /// Minimum numeric value
    pub min: Option<f64>,
    /// Maximum numeric value
    pub max: Option<f64>,
    /// Minimum length for text (characters) and bytes
    pub min_length: Option<usize>,
    /// Maximum length for text (characters) and bytes
    pub max_length: Option<usize>,
    /// Regex the text form must match
    pub pattern: Option<String>,
}

impl FieldDef {
    /// Create a new required field of the given type.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
            default: None,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Any)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Float)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Text)
    }

    pub fn bytes(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bytes)
    }

    pub fn json(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Json)
    }

    /// A partial reference to the model registered as `target`.
    pub fn partial(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, FieldType::Partial(target.into()))
    }

    /// Accept NULL, and fill in NULL when the input omits the field.
    pub fn optional(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Set the value used when the input omits the field.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Set the minimum numeric value.
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Set the maximum numeric value.
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// Set the minimum length.
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Set the maximum length.
    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    /// Require the text form to match `pattern`.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Is this field a partial reference?
    pub fn is_partial(&self) -> bool {
        matches!(self.field_type, FieldType::Partial(_))
    }

    /// The registry name of the referenced model, for partial fields.
    pub fn partial_target(&self) -> Option<&str> {
        match &self.field_type {
            FieldType::Partial(target) => Some(target),
            _ => None,
        }
    }
}
