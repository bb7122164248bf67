//! Core types for modelschema.
//!
//! This crate provides the model side of schema derivation:
//!
//! - `AttributeType` hierarchy with native value coercion
//! - `AttributeInfo` and `ModelDef` for describing models
//! - `ModelRegistry` for forward and reverse relation lookup
//! - `Record` instances with relation caches
//! - `RecordSource` lookups and an in-memory `MemoryStore`

pub mod attribute;
pub mod error;
pub mod model;
pub mod record;
pub mod registry;
pub mod store;
pub mod types;
pub mod value;

pub use attribute::{AttributeInfo, CoerceFn, DefaultFactory, DefaultValue, ForeignKeyInfo};
pub use error::{
    BindingError, ConfigError, Error, FieldValidationError, Result, SCHEMA_ERROR_KEY, TypeError,
    ValidationError, ValidationErrorKind,
};
pub use model::{Model, ModelDef, ModelDefBuilder};
pub use record::Record;
pub use registry::{ModelRegistry, RelationshipKind, ReverseRelation};
pub use store::{MemoryStore, RecordSource};
pub use types::{AttributeType, CustomType, parse_datetime};
pub use value::{DATE_FORMAT, DATETIME_FORMAT, TIME_FORMAT, Value, whole_i64};
