#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use modelschema::prelude::*;

pub fn role_model() -> Arc<ModelDef> {
    ModelDef::builder("Role")
        .attribute(AttributeInfo::char("name", 255).default("user"))
        .build()
}

pub fn user_model() -> Arc<ModelDef> {
    ModelDef::builder("User")
        .attribute(
            AttributeInfo::new("created", AttributeType::DateTime)
                .default_with(|| Value::Timestamp(Utc::now().naive_utc())),
        )
        .attribute(AttributeInfo::char("name", 255))
        .attribute(AttributeInfo::char("title", 127).nullable(true))
        .attribute(
            AttributeInfo::new("active", AttributeType::Boolean)
                .default(true)
                .help_text("Is user active"),
        )
        .attribute(AttributeInfo::new("rating", AttributeType::Integer).default(0))
        .attribute(AttributeInfo::foreign_key("role", "Role"))
        .build()
}

pub fn registry() -> ModelRegistry {
    ModelRegistry::new().with(role_model()).with(user_model())
}

/// A store holding one role ("user") and one user ("Mike") with ids 1.
pub struct Fixture {
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub role: Record,
    pub user: Record,
}

pub fn fixture() -> Fixture {
    let registry = registry();
    let store = Arc::new(MemoryStore::new());
    let role_model = registry.get("Role").unwrap();
    let user_model = registry.get("User").unwrap();

    let role = store.insert(Record::new(role_model)).unwrap();
    let user = store
        .insert(
            Record::new(user_model)
                .with("name", "Mike")
                .with("role", role.pk().clone()),
        )
        .unwrap();

    let config = Config::new()
        .with_registry(registry)
        .with_source(Arc::clone(&store) as Arc<dyn RecordSource>);
    Fixture {
        config,
        store,
        role,
        user,
    }
}

/// Typed counterpart of the `Role` model.
#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub id: Option<i64>,
    pub name: String,
}

impl Model for Role {
    fn definition() -> Arc<ModelDef> {
        role_model()
    }

    fn to_record(&self) -> Record {
        Record::new(Self::definition())
            .with("id", self.id)
            .with("name", self.name.as_str())
    }

    fn from_record(record: &Record) -> Result<Self> {
        Ok(Role {
            id: record.get_as("id")?,
            name: record.get_as("name")?,
        })
    }
}
