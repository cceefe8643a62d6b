//! Partial references.
//!
//! A partial field holds the primary key of another model. It accepts either
//! a record of that model, kept as-is, or a bare value that is validated
//! with the target's own primary key rule and stored as the coerced key.

use std::sync::Arc;

use crate::error::FieldValidationError;
use crate::field::FieldDef;
use crate::model::ModelSchema;
use crate::record::{FieldInput, FieldValue};
use crate::validate::validate_field;
use crate::value::Value;

/// Resolve `input` for the partial field `field`, which refers to `target`.
pub fn resolve(
    field: &FieldDef,
    target: &Arc<ModelSchema>,
    input: FieldInput,
) -> Result<FieldValue, FieldValidationError> {
    match input {
        FieldInput::Record(record) if is_instance_of(record.schema(), target) => {
            Ok(FieldValue::Instance(Box::new(record)))
        }
        FieldInput::Record(record) => {
            let pk = target.primary_key_field();
            let cause = FieldValidationError::type_mismatch(
                &pk.name,
                pk.field_type.describe(),
                record.model_name(),
            );
            Err(FieldValidationError::reference(&field.name, target.name(), cause))
        }
        FieldInput::Value(Value::Null) if field.nullable => Ok(FieldValue::Scalar(Value::Null)),
        FieldInput::Value(Value::Null) => Err(FieldValidationError::required(&field.name)),
        FieldInput::Value(value) => resolve_key(target, value)
            .map(FieldValue::Scalar)
            .map_err(|cause| FieldValidationError::reference(&field.name, target.name(), cause)),
    }
}

/// Validate a bare key against `target`'s primary key field, following the
/// chain when that key is itself a partial reference.
fn resolve_key(target: &ModelSchema, value: Value) -> Result<Value, FieldValidationError> {
    let pk = target.primary_key_field();
    match target.partial_target(&pk.name) {
        Some(next) => resolve_key(next, value)
            .map_err(|cause| FieldValidationError::reference(&pk.name, next.name(), cause)),
        None => validate_field(pk, value),
    }
}

fn is_instance_of(schema: &Arc<ModelSchema>, target: &Arc<ModelSchema>) -> bool {
    Arc::ptr_eq(schema, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrorKind;
    use crate::model::{Config, ModelBuilder, Registry};

    fn registry() -> (Registry, Arc<ModelSchema>) {
        let mut registry = Registry::new();
        let user = registry
            .define(
                ModelBuilder::new("User")
                    .field(FieldDef::int("id"))
                    .field(FieldDef::text("name"))
                    .config(Config::new("id")),
            )
            .unwrap();
        (registry, user)
    }

    #[test]
    fn bare_key_is_coerced() {
        let (_, user) = registry();
        let field = FieldDef::partial("author", "User");
        assert_eq!(
            resolve(&field, &user, Value::from(7).into()).unwrap(),
            FieldValue::Scalar(Value::Int(7))
        );
        assert_eq!(
            resolve(&field, &user, Value::from("7").into()).unwrap(),
            FieldValue::Scalar(Value::Int(7))
        );
    }

    #[test]
    fn bad_key_reports_cause() {
        let (_, user) = registry();
        let field = FieldDef::partial("author", "User");
        let err = resolve(&field, &user, Value::from("abc").into()).unwrap_err();
        assert_eq!(err.field, "author");
        assert_eq!(err.kind, ValidationErrorKind::Reference);
        let cause = err.cause.unwrap();
        assert_eq!(cause.field, "id");
        assert_eq!(cause.kind, ValidationErrorKind::Type);
    }

    #[test]
    fn instance_is_kept() {
        let (_, user) = registry();
        let alice = user
            .validate([("id", FieldInput::from(1)), ("name", FieldInput::from("Alice"))])
            .unwrap();
        let field = FieldDef::partial("author", "User");
        match resolve(&field, &user, alice.clone().into()).unwrap() {
            FieldValue::Instance(record) => assert_eq!(*record, alice),
            other => panic!("expected instance, got {other:?}"),
        }
    }

    #[test]
    fn instance_of_other_model_is_rejected() {
        let (mut registry, user) = registry();
        let tag = registry
            .define(
                ModelBuilder::new("Tag")
                    .field(FieldDef::int("id"))
                    .config(Config::new("id")),
            )
            .unwrap();
        let rust = tag.validate([("id", 1)]).unwrap();
        let field = FieldDef::partial("author", "User");
        let err = resolve(&field, &user, rust.into()).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Reference);
    }

    #[test]
    fn null_needs_optional_field() {
        let (_, user) = registry();
        let required = FieldDef::partial("author", "User");
        let err = resolve(&required, &user, Value::Null.into()).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Required);

        let optional = FieldDef::partial("author", "User").optional();
        assert_eq!(
            resolve(&optional, &user, Value::Null.into()).unwrap(),
            FieldValue::Scalar(Value::Null)
        );
    }

    #[test]
    fn chained_keys_resolve_through_targets() {
        let (mut registry, _) = registry();
        let profile = registry
            .define(
                ModelBuilder::new("Profile")
                    .field(FieldDef::partial("user", "User"))
                    .config(Config::new("user").partial("user", "users")),
            )
            .unwrap();
        let field = FieldDef::partial("profile", "Profile");
        assert_eq!(
            resolve(&field, &profile, Value::from("3").into()).unwrap(),
            FieldValue::Scalar(Value::Int(3))
        );
        let err = resolve(&field, &profile, Value::from("x").into()).unwrap_err();
        let inner = err.cause.unwrap();
        assert_eq!(inner.field, "user");
        assert_eq!(inner.kind, ValidationErrorKind::Reference);
        assert_eq!(inner.cause.unwrap().field, "id");
    }
}
