//! Validated records and their projections back to rows.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::{FieldValidationError, ValidationError};
use crate::field::FieldDef;
use crate::model::ModelSchema;
use crate::partial;
use crate::row::Row;
use crate::validate::validate_field;
use crate::value::Value;

/// A value supplied for one field when a record is built.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    Value(Value),
    /// A whole record, accepted by partial fields that refer to its model
    Record(Record),
}

impl From<Value> for FieldInput {
    fn from(value: Value) -> Self {
        FieldInput::Value(value)
    }
}

impl From<Record> for FieldInput {
    fn from(record: Record) -> Self {
        FieldInput::Record(record)
    }
}

impl From<bool> for FieldInput {
    fn from(v: bool) -> Self {
        FieldInput::Value(Value::Bool(v))
    }
}

impl From<i32> for FieldInput {
    fn from(v: i32) -> Self {
        FieldInput::Value(Value::Int(v))
    }
}

impl From<i64> for FieldInput {
    fn from(v: i64) -> Self {
        FieldInput::Value(Value::BigInt(v))
    }
}

impl From<f64> for FieldInput {
    fn from(v: f64) -> Self {
        FieldInput::Value(Value::Double(v))
    }
}

impl From<&str> for FieldInput {
    fn from(v: &str) -> Self {
        FieldInput::Value(Value::from(v))
    }
}

impl From<String> for FieldInput {
    fn from(v: String) -> Self {
        FieldInput::Value(Value::Text(v))
    }
}

/// JSON scalars become their natural value; arrays and objects stay JSON.
impl From<serde_json::Value> for FieldInput {
    fn from(v: serde_json::Value) -> Self {
        FieldInput::Value(Value::from_json(v))
    }
}

/// Instances stay records, so a partial field keeps accepting them.
impl From<FieldValue> for FieldInput {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Scalar(v) => FieldInput::Value(v),
            FieldValue::Instance(record) => FieldInput::Record(*record),
        }
    }
}

/// A stored field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    /// A related record passed to a partial field
    Instance(Box<Record>),
}

impl FieldValue {
    /// The value written to a column: scalars as-is, instances as their key.
    pub fn to_value(&self) -> Value {
        match self {
            FieldValue::Scalar(v) => v.clone(),
            FieldValue::Instance(record) => record.key().clone(),
        }
    }

    pub fn as_instance(&self) -> Option<&Record> {
        match self {
            FieldValue::Instance(record) => Some(record),
            FieldValue::Scalar(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Scalar(Value::Null))
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Scalar(v) => v.to_json(),
            FieldValue::Instance(record) => record.to_json(),
        }
    }
}

/// Options for projecting a record to a row.
#[derive(Debug, Clone, Default)]
pub struct DumpOptions {
    /// Only include these fields (if Some)
    pub include: Option<HashSet<String>>,
    /// Exclude these fields
    pub exclude: Option<HashSet<String>>,
    /// Exclude fields with NULL values
    pub exclude_none: bool,
}

impl DumpOptions {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set fields to include.
    pub fn include(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Set fields to exclude.
    pub fn exclude(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Enable exclude_none mode.
    pub fn exclude_none(mut self) -> Self {
        self.exclude_none = true;
        self
    }

    fn keeps(&self, field: &str) -> bool {
        self.include.as_ref().is_none_or(|inc| inc.contains(field))
            && !self.exclude.as_ref().is_some_and(|exc| exc.contains(field))
    }
}

/// A record that passed its model's validation.
///
/// Every declared field holds a value, in declaration order.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<ModelSchema>,
    values: Vec<FieldValue>,
}

impl Record {
    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn model_name(&self) -> &str {
        self.schema.name()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.schema.field_index(field).map(|i| &self.values[i])
    }

    /// The column value of `field`. Instances yield their key.
    pub fn value(&self, field: &str) -> Option<Value> {
        self.get(field).map(FieldValue::to_value)
    }

    /// The primary key value.
    pub fn key(&self) -> &Value {
        match &self.values[self.schema.primary_key_index()] {
            FieldValue::Scalar(v) => v,
            FieldValue::Instance(record) => record.key(),
        }
    }

    /// Swap the key held by partial field `field` for the record it names.
    ///
    /// Returns false and leaves the record unchanged when `field` is not a
    /// partial field, `instance` belongs to another model, or its key is not
    /// the stored one.
    pub fn attach(&mut self, field: &str, instance: Record) -> bool {
        let Some(index) = self.schema.field_index(field) else {
            return false;
        };
        let targets_instance = self
            .schema
            .partial_target(field)
            .is_some_and(|target| Arc::ptr_eq(target, instance.schema()));
        if !targets_instance || self.values[index].to_value() != *instance.key() {
            return false;
        }
        self.values[index] = FieldValue::Instance(Box::new(instance));
        true
    }

    /// Iterate over `(field, value)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.schema.field_names().zip(self.values.iter())
    }

    /// Project to a row, leaving out the model's excluded fields.
    pub fn dump(&self) -> Row {
        let exclude = &self.schema.config().exclude;
        if exclude.is_empty() {
            return self.dump_with(&DumpOptions::default());
        }
        self.dump_with(&DumpOptions::new().exclude(exclude.iter().cloned()))
    }

    /// Project to a row with explicit filters.
    pub fn dump_with(&self, options: &DumpOptions) -> Row {
        Row::from_pairs(
            self.iter()
                .filter(|(name, _)| options.keeps(name))
                .filter(|(_, value)| !(options.exclude_none && value.is_null()))
                .map(|(name, value)| (name, value.to_value())),
        )
    }

    /// Render every field as JSON, nesting related instances in full.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.iter()
                .map(|(name, value)| (name.to_string(), value.to_json()))
                .collect(),
        )
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.schema, &other.schema) || self.schema.name() == other.schema.name())
            && self.values == other.values
    }
}

impl ModelSchema {
    /// Build a record from `(field, value)` pairs.
    ///
    /// Missing fields take their default, or NULL when optional. Keys that
    /// name no field are ignored. Every failing field is reported.
    pub fn validate<I, K, V>(self: &Arc<Self>, input: I) -> Result<Record, ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldInput>,
    {
        let mut input: HashMap<String, FieldInput> = input
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut errors = ValidationError::new();
        let mut values = Vec::with_capacity(self.fields().len());
        for field in self.fields() {
            match self.validate_one(field, input.remove(&field.name)) {
                Ok(value) => values.push(value),
                Err(e) => errors.push(e),
            }
        }
        errors.into_result()?;

        Ok(Record {
            schema: Arc::clone(self),
            values,
        })
    }

    /// Build a record from a named row.
    pub fn validate_row(self: &Arc<Self>, row: &Row) -> Result<Record, ValidationError> {
        self.validate(row.iter().map(|(name, value)| (name, value.clone())))
    }

    /// Build a record from a JSON object.
    pub fn validate_json(
        self: &Arc<Self>,
        json: &serde_json::Value,
    ) -> Result<Record, ValidationError> {
        match json.as_object() {
            Some(object) => self.validate(
                object
                    .iter()
                    .map(|(name, value)| (name.as_str(), value.clone())),
            ),
            None => {
                let mut errors = ValidationError::new();
                errors.add_model_error(format!(
                    "{} expects a JSON object, got {json}",
                    self.name()
                ));
                Err(errors)
            }
        }
    }

    fn validate_one(
        &self,
        field: &FieldDef,
        input: Option<FieldInput>,
    ) -> Result<FieldValue, FieldValidationError> {
        let Some(input) = input else {
            return match &field.default {
                Some(default) => Ok(FieldValue::Scalar(default.clone())),
                None if field.nullable => Ok(FieldValue::Scalar(Value::Null)),
                None => Err(FieldValidationError::required(&field.name)),
            };
        };

        if let Some(target) = self.partial_target(&field.name) {
            return partial::resolve(field, target, input);
        }

        match input {
            FieldInput::Value(value) => validate_field(field, value).map(FieldValue::Scalar),
            FieldInput::Record(record) => Err(FieldValidationError::type_mismatch(
                &field.name,
                field.field_type.describe(),
                record.model_name(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrorKind;
    use crate::model::{Config, ModelBuilder, Registry};
    use serde_json::json;

    fn models() -> (Arc<ModelSchema>, Arc<ModelSchema>) {
        let mut registry = Registry::new();
        let user = registry
            .define(
                ModelBuilder::new("User")
                    .field(FieldDef::int("id"))
                    .field(FieldDef::text("name"))
                    .field(FieldDef::text("password").default("changeme"))
                    .field(FieldDef::int("age").optional())
                    .config(Config::new("id").exclude(["password"])),
            )
            .unwrap();
        let post = registry
            .define(
                ModelBuilder::new("Post")
                    .field(FieldDef::int("id"))
                    .field(FieldDef::text("title"))
                    .field(FieldDef::partial("author", "User"))
                    .config(Config::new("id").partial("author", "users")),
            )
            .unwrap();
        (user, post)
    }

    #[test]
    fn missing_fields_take_defaults() {
        let (user, _) = models();
        let record = user
            .validate([("id", FieldInput::from("1")), ("name", FieldInput::from("Ann"))])
            .unwrap();
        assert_eq!(record.key(), &Value::Int(1));
        assert_eq!(record.value("password"), Some(Value::from("changeme")));
        assert_eq!(record.value("age"), Some(Value::Null));
    }

    #[test]
    fn all_failing_fields_are_reported() {
        let (user, _) = models();
        let err = user
            .validate([("id", "x"), ("unknown", "ignored")])
            .unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert_eq!(err.for_field("id").next().unwrap().kind, ValidationErrorKind::Type);
        assert_eq!(
            err.for_field("name").next().unwrap().kind,
            ValidationErrorKind::Required
        );
    }

    #[test]
    fn dump_hides_excluded_fields() {
        let (user, _) = models();
        let record = user
            .validate_json(&json!({"id": 1, "name": "Ann", "password": "pw"}))
            .unwrap();
        let row = record.dump();
        let names: Vec<&str> = row.column_names().collect();
        assert_eq!(names, ["id", "name", "age"]);

        let row = record.dump_with(&DumpOptions::new().include(["id", "password"]));
        assert_eq!(row.get_by_name("password"), Some(&Value::from("pw")));
        assert_eq!(row.len(), 2);

        let row = record.dump_with(&DumpOptions::new().exclude_none());
        assert!(!row.contains_column("age"));
    }

    #[test]
    fn partial_instance_dumps_as_key() {
        let (user, post) = models();
        let ann = user.validate([("id", 4), ("name", 4)]).unwrap();
        assert_eq!(ann.value("name"), Some(Value::from("4")));

        let record = post
            .validate([
                ("id", FieldInput::from(1)),
                ("title", FieldInput::from("Hello")),
                ("author", FieldInput::from(ann.clone())),
            ])
            .unwrap();
        assert_eq!(record.get("author").unwrap().as_instance(), Some(&ann));
        assert_eq!(record.dump().get_by_name("author"), Some(&Value::Int(4)));
        assert_eq!(record.to_json()["author"]["name"], json!("4"));

        let by_key = post
            .validate_json(&json!({"id": 2, "title": "Bye", "author": "4"}))
            .unwrap();
        assert_eq!(by_key.get("author"), Some(&FieldValue::Scalar(Value::Int(4))));
    }

    #[test]
    fn attach_swaps_a_matching_key_for_its_record() {
        let (_, post) = models();
        let user = Arc::clone(post.partial_target("author").unwrap());
        let ann = user.validate([("id", 4), ("name", 4)]).unwrap();
        let bob = user.validate([("id", 5), ("name", 5)]).unwrap();
        let mut record = post
            .validate_json(&json!({"id": 1, "title": "t", "author": 4}))
            .unwrap();

        assert!(!record.attach("author", bob));
        assert!(!record.attach("title", ann.clone()));
        assert_eq!(record.get("author"), Some(&FieldValue::Scalar(Value::Int(4))));

        assert!(record.attach("author", ann.clone()));
        assert_eq!(record.get("author").unwrap().as_instance(), Some(&ann));
        assert_eq!(record.value("author"), Some(Value::Int(4)));

        // a record of a same-named but separately defined model is not an instance
        let (other_user, _) = models();
        let stranger = other_user.validate([("id", 4), ("name", 4)]).unwrap();
        let mut fresh = post
            .validate_json(&json!({"id": 2, "title": "t", "author": 4}))
            .unwrap();
        assert!(!fresh.attach("author", stranger));
    }

    #[test]
    fn records_are_not_plain_values() {
        let (user, post) = models();
        let ann = user.validate([("id", 4), ("name", 4)]).unwrap();
        let err = post
            .validate([
                ("id", FieldInput::from(ann)),
                ("title", FieldInput::from("t")),
                ("author", FieldInput::from(4)),
            ])
            .unwrap_err();
        assert_eq!(err.for_field("id").next().unwrap().kind, ValidationErrorKind::Type);
    }

    #[test]
    fn out_of_range_keys_fail_instead_of_saturating() {
        let (user, post) = models();
        let err = user
            .validate_json(&json!({"id": u64::MAX, "name": "Ann"}))
            .unwrap_err();
        assert_eq!(err.for_field("id").next().unwrap().kind, ValidationErrorKind::Type);

        let err = user
            .validate([("id", "9223372036854775808"), ("name", "Ann")])
            .unwrap_err();
        assert_eq!(err.for_field("id").next().unwrap().kind, ValidationErrorKind::Type);

        let err = post
            .validate_json(&json!({"id": 1, "title": "t", "author": "9223372036854775808"}))
            .unwrap_err();
        let author = err.for_field("author").next().unwrap();
        assert_eq!(author.kind, ValidationErrorKind::Reference);
        assert_eq!(author.cause.as_ref().unwrap().kind, ValidationErrorKind::Type);

        let err = post
            .validate_json(&json!({"id": 1, "title": "t", "author": u64::MAX}))
            .unwrap_err();
        assert_eq!(
            err.for_field("author").next().unwrap().kind,
            ValidationErrorKind::Reference
        );
    }

    #[test]
    fn json_input_must_be_object() {
        let (user, _) = models();
        let err = user.validate_json(&json!([1, 2])).unwrap_err();
        assert_eq!(err.errors[0].kind, ValidationErrorKind::Model);
    }
}
