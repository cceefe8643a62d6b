use rowmodel::prelude::*;
use rowmodel::{FieldValue, SchemaErrorKind, ValidationErrorKind};
use serde_json::json;
use std::sync::Arc;

fn schema_error(result: Result<Arc<ModelSchema>>) -> rowmodel::SchemaError {
    match result {
        Err(Error::Schema(e)) => e,
        other => panic!("expected schema error, got {other:?}"),
    }
}

fn registry_with_user() -> (Registry, Arc<ModelSchema>) {
    let mut registry = Registry::new();
    let user = registry
        .define(
            ModelBuilder::new("User")
                .field(FieldDef::int("id"))
                .field(FieldDef::text("name"))
                .config(json!({"search_by": "id"})),
        )
        .expect("define User");
    (registry, user)
}

#[test]
fn model_without_config_is_never_registered() {
    let mut registry = Registry::new();
    let err = schema_error(registry.define(ModelBuilder::new("Orphan").field(FieldDef::int("id"))));
    assert_eq!(err.kind, SchemaErrorKind::MissingConfig);
    assert_eq!(err.model, "Orphan");
    assert!(registry.get("Orphan").is_none());
}

#[test]
fn every_unmapped_partial_is_listed() {
    let (mut registry, _) = registry_with_user();
    let err = schema_error(
        registry.define(
            ModelBuilder::new("Post")
                .field(FieldDef::int("id"))
                .field(FieldDef::partial("author", "User"))
                .field(FieldDef::partial("editor", "User"))
                .field(FieldDef::partial("reviewer", "User"))
                .config(Config::new("id").partial("editor", "users")),
        ),
    );
    assert_eq!(err.kind, SchemaErrorKind::MissingPartials);
    assert_eq!(err.fields, ["author", "reviewer"]);
    assert!(!registry.contains("Post"));
}

#[test]
fn partial_values_are_coerced_to_the_target_key() {
    let (mut registry, user) = registry_with_user();
    let post = registry
        .define(
            ModelBuilder::new("Post")
                .field(FieldDef::int("id"))
                .field(FieldDef::partial("author", "User"))
                .config(Config::new("id").partial("author", "users")),
        )
        .expect("define Post");

    // a bare key that validates against User.id
    let record = post
        .validate([("id", FieldInput::from(1)), ("author", FieldInput::from("7"))])
        .expect("valid key");
    assert_eq!(record.value("author"), Some(Value::Int(7)));

    // a bare key that does not
    let err = post
        .validate([("id", FieldInput::from(2)), ("author", FieldInput::from("abc"))])
        .unwrap_err();
    let failure = err.for_field("author").next().expect("author error");
    assert_eq!(failure.kind, ValidationErrorKind::Reference);
    assert_eq!(failure.cause.as_ref().map(|c| c.field.as_str()), Some("id"));

    // an instance of the target is kept as-is
    let alice = user
        .validate([("id", Value::Int(3)), ("name", Value::from("alice"))])
        .expect("valid user");
    let record = post
        .validate([
            ("id", FieldInput::from(3)),
            ("author", FieldInput::from(alice.clone())),
        ])
        .expect("instance accepted");
    match record.get("author") {
        Some(FieldValue::Instance(instance)) => assert_eq!(**instance, alice),
        other => panic!("expected instance, got {other:?}"),
    }
    assert_eq!(record.value("author"), Some(Value::Int(3)));
}

#[test]
fn raw_config_is_checked_before_fields() {
    let mut registry = Registry::new();
    let err = schema_error(
        registry.define(
            ModelBuilder::new("User")
                .field(FieldDef::int("id"))
                .config(json!({"search_by": "id", "unknown_key": true})),
        ),
    );
    assert_eq!(err.kind, SchemaErrorKind::InvalidConfig);
}
