mod common;

use modelschema::prelude::*;
use modelschema::{DefaultValue, FieldParams, SchemaOpts};
use serde_json::json;

use common::{fixture, user_model};

fn opts() -> SchemaOpts {
    SchemaOpts::resolve(&Meta::new().model(user_model()), &Config::new()).unwrap()
}

fn active() -> AttributeInfo {
    user_model().attribute("active").unwrap().clone()
}

#[test]
fn boolean_carries_default_and_description() {
    let field = ModelConverter::new().convert(&active(), &opts()).unwrap();
    assert!(matches!(field.kind, FieldKind::Boolean));
    assert!(matches!(
        field.params.load_default,
        Some(DefaultValue::Value(Value::Bool(true)))
    ));
    assert!(!field.params.required);
    assert_eq!(field.params.metadata["description"], json!("Is user active"));
}

#[test]
fn deferred_foreign_key_is_raw_key() {
    let attr = AttributeInfo::deferred_foreign_key("user", "Child");
    let field = ModelConverter::new().convert(&attr, &opts()).unwrap();
    assert!(matches!(field.kind, FieldKind::ForeignKey(_)));
}

#[test]
fn register_overrides_earlier_rules() {
    let mut converter = ModelConverter::new();
    converter.register(AttributeType::Boolean, FieldClass::String);
    let field = converter.convert(&active(), &opts()).unwrap();
    assert!(matches!(field.kind, FieldKind::String));

    converter.register_with(
        AttributeType::Boolean,
        |_: &AttributeInfo, _: &SchemaOpts, _: FieldParams| {
            Some(Field::string().load_default("yes"))
        },
    );
    let field = converter.convert(&active(), &opts()).unwrap();
    assert!(matches!(field.kind, FieldKind::String));
    assert!(matches!(
        field.params.load_default,
        Some(DefaultValue::Value(Value::Text(ref s))) if s == "yes"
    ));
}

#[test]
fn builder_can_drop_attributes() {
    let converter = ModelConverter::new()
        .with_builder(AttributeType::Boolean, |_: &AttributeInfo, _: &SchemaOpts, _: FieldParams| None);
    let fields = converter.get_fields(&user_model(), &opts());
    assert!(!fields.contains_key("active"));
    assert!(fields.contains_key("rating"));
}

#[test]
fn schema_converter_is_inherited() {
    let fx = fixture();
    let converter = ModelConverter::new().with(AttributeType::Boolean, FieldClass::String);
    let base = SchemaBuilder::new("CustomSchema")
        .meta(Meta::new().converter(converter))
        .build(&fx.config)
        .unwrap();
    let schema = SchemaBuilder::new("UserSchema")
        .extends(&base)
        .meta(Meta::new().model_named("User"))
        .build(&fx.config)
        .unwrap();

    assert_eq!(schema.opts().model_converter.len(), ModelConverter::new().len() + 1);
    assert_eq!(schema.dump(&fx.user).unwrap()["active"], json!("true"));

    // the shared default converter is untouched
    let plain = SchemaBuilder::new("UserSchema")
        .meta(Meta::new().model_named("User"))
        .build(&fx.config)
        .unwrap();
    assert_eq!(plain.dump(&fx.user).unwrap()["active"], json!(true));
}

#[test]
fn config_converter_applies_to_every_schema() {
    let fx = fixture();
    let config = fx
        .config
        .clone()
        .with_converter(ModelConverter::new().with(AttributeType::Integer, FieldClass::String));
    let schema = SchemaBuilder::new("UserSchema")
        .meta(Meta::new().model_named("User"))
        .build(&config)
        .unwrap();
    assert_eq!(schema.dump(&fx.user).unwrap()["rating"], json!("0"));
}

#[test]
fn custom_types_resolve_through_their_base() {
    let rating = AttributeType::custom("Rating", AttributeType::Integer);
    let review = ModelDef::builder("Review")
        .attribute(AttributeInfo::new("score", rating.clone()).default(0))
        .attribute(AttributeInfo::new("votes", AttributeType::BigInteger).default(0))
        .build();

    let converter = ModelConverter::new().with(AttributeType::Integer, FieldClass::Float);
    let schema = SchemaBuilder::new("ReviewSchema")
        .meta(Meta::new().model(std::sync::Arc::clone(&review)).converter(converter))
        .build(&Config::new())
        .unwrap();
    assert!(matches!(schema.field("score").unwrap().kind, FieldKind::Float));
    // BigInteger keeps its own, more specific rule
    assert!(matches!(schema.field("votes").unwrap().kind, FieldKind::Integer));

    let converter = ModelConverter::new().with(rating, FieldClass::String);
    let schema = SchemaBuilder::new("ReviewSchema")
        .meta(Meta::new().model(review).converter(converter))
        .build(&Config::new())
        .unwrap();
    assert!(matches!(schema.field("score").unwrap().kind, FieldKind::String));
}

#[test]
fn declared_fields_win_over_derived() {
    let fx = fixture();
    let schema = SchemaBuilder::new("UserSchema")
        .meta(Meta::new().model_named("User"))
        .field("rating", Field::string().dump_only(true))
        .field("nickname", Field::string().attribute("name").dump_only(true))
        .build(&fx.config)
        .unwrap();

    assert!(matches!(schema.field("rating").unwrap().kind, FieldKind::String));
    let dumped = schema.dump(&fx.user).unwrap();
    assert_eq!(dumped["rating"], json!("0"));
    assert_eq!(dumped["nickname"], json!("Mike"));
    let keys: Vec<_> = schema.fields().keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        ["id", "created", "name", "title", "active", "rating", "role", "nickname"]
    );
}
