//! modelschema - derive serialization schemas from model definitions.
//!
//! Given a model (a named record type with typed, nullable and defaultable
//! attributes and foreign keys), a schema gets one field per attribute
//! through an ordered type-to-field rule list, overridable per attribute type
//! and per field. Schemas dump records to JSON and load JSON back into new or
//! existing records, with partial updates and aggregated validation errors.
//!
//! # Quick Start
//!
//! ```ignore
//! use modelschema::prelude::*;
//!
//! let role = ModelDef::builder("Role")
//!     .attribute(AttributeInfo::char("name", 255).default("user"))
//!     .build();
//! let user = ModelDef::builder("User")
//!     .attribute(AttributeInfo::char("name", 255))
//!     .attribute(AttributeInfo::foreign_key("role", "Role"))
//!     .build();
//!
//! let config = Config::new().with_registry(ModelRegistry::new().with(role).with(user));
//!
//! let schema = SchemaBuilder::new("UserSchema")
//!     .meta(Meta::new().model_named("User"))
//!     .field("role", Field::related(Related::new()))
//!     .build(&config)?;
//!
//! let json = schema.dump(&record)?;
//! let record = schema.load(&json!({"name": "Mike", "role": 1}))?;
//! ```
//!
//! # Crates
//!
//! - `modelschema-core`: values, errors, model definitions, records
//! - `modelschema`: converter, fields, schemas

pub mod config;
pub mod convert;
pub mod fields;
pub mod opts;
pub mod schema;
pub mod validate;

pub use modelschema_core::{
    AttributeInfo, AttributeType, BindingError, ConfigError, CustomType, DefaultValue, Error,
    FieldValidationError, ForeignKeyInfo, MemoryStore, Model, ModelDef, ModelDefBuilder,
    ModelRegistry, Record, RecordSource, RelationshipKind, Result, ReverseRelation, TypeError,
    ValidationError, ValidationErrorKind, Value, parse_datetime,
};

pub use config::{Config, Defaults};
pub use convert::{FieldBuilder, ModelConverter};
pub use fields::{
    Field, FieldClass, FieldKind, FieldParams, FkNested, ForeignKeyField, LoadedValue, Nested,
    Related,
};
pub use opts::{INHERITANCE_OPTIONS, Meta, ModelRef, SchemaOpts, Unknown};
pub use schema::{LoadedData, Loader, Schema, SchemaBuilder};
pub use validate::Validator;

/// Common imports.
pub mod prelude {
    pub use crate::{
        AttributeInfo, AttributeType, Config, Error, Field, FieldClass, FieldKind, FkNested,
        MemoryStore, Meta, Model, ModelConverter, ModelDef, ModelRegistry, Nested, Record,
        RecordSource, Related, Result, Schema, SchemaBuilder, Unknown, Validator, Value,
    };
}
