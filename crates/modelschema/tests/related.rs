mod common;

use modelschema::LoadedValue;
use modelschema::prelude::*;
use serde_json::json;

use common::{fixture, registry, role_model, user_model};

#[test]
fn related_dump_fetches_target() {
    let fx = fixture();
    let schema = SchemaBuilder::new("UserSchema")
        .meta(
            Meta::new()
                .model_named("User")
                .dump_only_pk(false)
                .exclude(["rating"]),
        )
        .field("role", Field::related(Related::new().meta(Meta::new().unknown(Unknown::Exclude))))
        .build(&fx.config)
        .unwrap();

    let role = schema.field("role").unwrap();
    assert_eq!(role.attribute_name(), "role");
    match &role.kind {
        FieldKind::Related(related) => {
            assert!(related.is_bound());
            assert!(!related.is_many());
            assert_eq!(related.target().unwrap().name(), "Role");
        }
        other => panic!("unexpected kind {other:?}"),
    }

    let dumped = schema.dump(&fx.user).unwrap();
    assert_eq!(dumped["role"], json!({"id": "1", "name": "user"}));
    assert!(dumped.get("rating").is_none());

    let loaded = schema
        .loader()
        .unknown(Unknown::Exclude)
        .load(&dumped)
        .unwrap();
    assert_eq!(loaded.pk(), &Value::BigInt(1));
    let role = loaded.related("role").unwrap();
    assert_eq!(role.model_name(), "Role");
    assert_eq!(role.value("name"), &Value::from("user"));
}

#[test]
fn related_accepts_key_shorthand() {
    let fx = fixture();
    let schema = SchemaBuilder::new("UserSchema")
        .meta(Meta::new().model_named("User"))
        .field("role", Field::related(Related::new()))
        .build(&fx.config)
        .unwrap();

    let loaded = schema
        .loader()
        .unknown(Unknown::Exclude)
        .load(&json!({"name": "Kevin", "role": "1"}))
        .unwrap();
    assert!(loaded.pk().is_null());
    assert_eq!(loaded.value("role"), &Value::BigInt(1));
    assert!(loaded.related("role").is_none());

    let err = schema
        .load(&json!({"name": "Kevin", "role": "one"}))
        .unwrap_err();
    assert_eq!(
        err.validation().unwrap().messages("role"),
        ["expected integer, found 'one'"]
    );
}

#[test]
fn related_with_explicit_schema() {
    let fx = fixture();
    let role_schema = SchemaBuilder::new("RoleSchema")
        .meta(Meta::new().model_named("Role").fields(["id"]))
        .build(&fx.config)
        .unwrap();
    let schema = SchemaBuilder::new("UserSchema")
        .meta(Meta::new().model_named("User").dump_only_pk(false))
        .field("role", Field::related(Related::with_schema(role_schema)))
        .build(&fx.config)
        .unwrap();

    let dumped = schema.dump(&fx.user).unwrap();
    assert_eq!(dumped["role"], json!({"id": "1"}));
}

#[test]
fn explicit_schema_outside_model_relations() {
    let fx = fixture();
    let role_schema = SchemaBuilder::new("RoleSchema")
        .meta(Meta::new().model_named("Role"))
        .build(&fx.config)
        .unwrap();
    let schema = SchemaBuilder::new("UserSchema")
        .meta(Meta::new().model_named("User").fields(["name", "extra_role"]))
        .field("extra_role", Field::related(Related::with_schema(role_schema)))
        .build(&fx.config)
        .unwrap();

    match &schema.field("extra_role").unwrap().kind {
        FieldKind::Related(related) => {
            assert!(related.has_schema());
            assert!(!related.is_bound());
        }
        other => panic!("unexpected kind {other:?}"),
    }
    assert_eq!(
        schema.dump(&fx.user).unwrap(),
        json!({"name": "Mike", "extra_role": null})
    );

    let data = schema
        .load_data(&json!({"name": "Ann", "extra_role": {"name": "guest"}}))
        .unwrap();
    match &data["extra_role"] {
        LoadedValue::Record(role) => assert_eq!(role.value("name"), &Value::from("guest")),
        other => panic!("unexpected value {other:?}"),
    }

    // no relation, so no key type to read a bare key with
    let err = schema
        .load_data(&json!({"name": "Ann", "extra_role": 1}))
        .unwrap_err();
    assert!(matches!(err, Error::Binding(ref b) if b.field == "extra_role"));
}

#[test]
fn explicit_schema_on_relation_attribute_reads_keys() {
    let fx = fixture();
    let role_schema = SchemaBuilder::new("RoleSchema")
        .meta(Meta::new().model_named("Role"))
        .build(&fx.config)
        .unwrap();
    let schema = SchemaBuilder::new("UserSchema")
        .meta(Meta::new().model_named("User").fields(["name", "owner_role"]))
        .field(
            "owner_role",
            Field::related(Related::with_schema(role_schema)).attribute("role"),
        )
        .build(&fx.config)
        .unwrap();

    assert_eq!(
        schema.dump(&fx.user).unwrap()["owner_role"],
        json!({"id": "1", "name": "user"})
    );
    let data = schema
        .load_data(&json!({"name": "Ann", "owner_role": "1"}))
        .unwrap();
    assert_eq!(data["role"], LoadedValue::Value(Value::BigInt(1)));
}

#[test]
fn related_prefers_cached_record() {
    let fx = fixture();
    let schema = SchemaBuilder::new("UserSchema")
        .meta(Meta::new().model_named("User").string_keys(false))
        .field("role", Field::related(Related::new().only(["name"])))
        .build(&fx.config)
        .unwrap();

    let mut user = fx.user.clone();
    let admin = Record::new(role_model()).with("id", 1).with("name", "admin");
    user.set_related("role", admin).unwrap();
    assert_eq!(schema.dump(&user).unwrap()["role"], json!({"name": "admin"}));

    user.set("role", Value::Null).unwrap();
    assert_eq!(schema.dump(&user).unwrap()["role"], json!(null));
}

#[test]
fn related_reports_missing_targets() {
    let fx = fixture();
    let schema = SchemaBuilder::new("UserSchema")
        .meta(Meta::new().model_named("User"))
        .field("role", Field::related(Related::new()))
        .build(&fx.config)
        .unwrap();

    let orphan = fx.user.clone().with("role", 42);
    let err = schema.dump(&orphan).unwrap_err();
    assert_eq!(err.to_string(), "Role with key 42 does not exist");

    let detached = Config::new().with_registry(registry());
    let schema = SchemaBuilder::new("UserSchema")
        .meta(Meta::new().model_named("User"))
        .field("role", Field::related(Related::new()))
        .build(&detached)
        .unwrap();
    let err = schema.dump(&fx.user).unwrap_err();
    assert!(err.to_string().contains("no record source is configured"));
}

#[test]
fn reverse_relation_dumps_backrefs() {
    let fx = fixture();
    let schema = SchemaBuilder::new("RoleSchema")
        .meta(Meta::new().model_named("Role"))
        .field("user_set", Field::related(Related::new().only(["id", "name"])))
        .build(&fx.config)
        .unwrap();

    let dumped = schema.dump(&fx.role).unwrap();
    assert_eq!(dumped["user_set"], json!([{"id": "1", "name": "Mike"}]));

    let mut role = fx.role.clone();
    role.set_backrefs("user_set", Vec::new());
    assert_eq!(schema.dump(&role).unwrap()["user_set"], json!([]));

    let loaded = schema
        .load(&json!({"name": "staff", "user_set": [{"name": "Ann"}, {"name": "Bo"}]}))
        .unwrap();
    let users = loaded.backrefs("user_set").unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[1].value("name"), &Value::from("Bo"));

    let err = schema
        .load(&json!({"user_set": [{"name": "Ann"}, {"name": 5}]}))
        .unwrap_err();
    assert_eq!(
        err.validation().unwrap().to_json(),
        json!({"user_set.1.name": ["Not a valid string."]})
    );
}

#[test]
fn related_on_non_relation_is_config_error() {
    let fx = fixture();
    let err = SchemaBuilder::new("UserSchema")
        .meta(Meta::new().model_named("User"))
        .field("name", Field::related(Related::new()))
        .build(&fx.config)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Configuration error: 'name' is not a relation of model 'User'"
    );
}

#[test]
fn related_without_model_cannot_load() {
    let schema = SchemaBuilder::new("Loose")
        .field("role", Field::related(Related::new()))
        .build(&Config::new())
        .unwrap();
    let err = schema.load_data(&json!({"role": 1})).unwrap_err();
    assert!(matches!(err, Error::Binding(ref b) if b.field == "role"));
}

#[test]
fn fk_nested_uses_cache_only() {
    let fx = fixture();
    let schema = SchemaBuilder::new("UserSchema")
        .meta(Meta::new().model(user_model()))
        .field("role", Field::fk_nested(FkNested::model(role_model()).exclude(["id"])))
        .build(&fx.config)
        .unwrap();

    // stored user has a key but nothing cached
    assert_eq!(schema.dump(&fx.user).unwrap()["role"], json!(null));

    let mut user = fx.user.clone();
    user.set_related("role", fx.role.clone()).unwrap();
    assert_eq!(schema.dump(&user).unwrap()["role"], json!({"name": "user"}));

    let loaded = schema
        .load(&json!({"name": "Ann", "role": {"name": "guest"}}))
        .unwrap();
    assert_eq!(
        loaded.related("role").unwrap().value("name"),
        &Value::from("guest")
    );
}

#[test]
fn nested_schema_embeds_cached_record() {
    let fx = fixture();
    let role_schema = SchemaBuilder::new("RoleSchema")
        .meta(Meta::new().model_named("Role"))
        .build(&fx.config)
        .unwrap();
    let schema = SchemaBuilder::new("UserSchema")
        .meta(Meta::new().model_named("User").fields(["name", "role"]))
        .field("role", Field::nested(Nested::new(role_schema)))
        .build(&fx.config)
        .unwrap();

    let mut user = fx.user.clone();
    user.set_related("role", fx.role.clone()).unwrap();
    assert_eq!(
        schema.dump(&user).unwrap(),
        json!({"name": "Mike", "role": {"id": "1", "name": "user"}})
    );
}

#[test]
fn self_referential_relation() {
    let node = ModelDef::builder("Node")
        .attribute(AttributeInfo::char("label", 32))
        .attribute(AttributeInfo::deferred_foreign_key("parent", "Node").nullable(true))
        .build();
    let draft = Record::new(std::sync::Arc::clone(&node)).with("label", "draft");
    let store = std::sync::Arc::new(MemoryStore::new());
    let root = store
        .insert(Record::new(std::sync::Arc::clone(&node)).with("label", "root"))
        .unwrap();
    let leaf = store
        .insert(
            Record::new(std::sync::Arc::clone(&node))
                .with("label", "leaf")
                .with("parent", root.pk().clone()),
        )
        .unwrap();
    let config = Config::new()
        .with_registry(ModelRegistry::new().with(node))
        .with_source(store);

    let schema = SchemaBuilder::new("NodeSchema")
        .meta(Meta::new().model_named("Node"))
        .field("parent", Field::related(Related::new().only(["label", "parent"])).allow_none(true))
        .field("node_set", Field::related(Related::new().only(["label"])))
        .build(&config)
        .unwrap();

    let dumped = schema.dump(&leaf).unwrap();
    assert_eq!(dumped["parent"], json!({"label": "root", "parent": null}));
    assert_eq!(dumped["node_set"], json!([]));
    assert_eq!(
        schema.dump(&root).unwrap()["node_set"],
        json!([{"label": "leaf"}])
    );

    // unsaved: the stored root also has a null parent but is not a child
    let dumped = schema.dump(&draft).unwrap();
    assert_eq!(dumped["parent"], json!(null));
    assert_eq!(dumped["node_set"], json!([]));
}
