//! Serialization fields.
//!
//! A [`Field`] pairs a [`FieldKind`] (how a value is rendered and parsed)
//! with [`FieldParams`] (where the value lives and how absence, null and
//! validation are handled). Schemas own their fields; a field is bound to its
//! schema once, when the schema is built.

mod primitive;
pub mod related;
pub mod timestamp;

use indexmap::IndexMap;
use serde_json::Value as Json;

use modelschema_core::{
    AttributeInfo, AttributeType, DefaultValue, Error, Record, RecordSource, Result,
    SCHEMA_ERROR_KEY, ValidationError, ValidationErrorKind, Value,
};

use crate::config::Config;
use crate::opts::SchemaOpts;
use crate::validate::Validator;

pub use related::{FkNested, ForeignKeyField, Nested, Related};

/// How a field renders and parses its value.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Passes values through as JSON.
    Raw,
    String,
    Integer,
    Float,
    /// Fixed precision number, rendered as a string.
    Decimal,
    Boolean,
    /// Datetime with an optional format: `iso`, `timestamp`, `timestamp_ms`
    /// or a strftime pattern.
    DateTime(Option<String>),
    Date(Option<String>),
    Time(Option<String>),
    Uuid,
    /// Whole seconds since the epoch.
    Timestamp,
    /// Milliseconds since the epoch.
    MsTimestamp,
    Nested(Nested),
    Related(Related),
    FkNested(FkNested),
    ForeignKey(ForeignKeyField),
}

impl FieldKind {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Raw => "Raw",
            FieldKind::String => "String",
            FieldKind::Integer => "Integer",
            FieldKind::Float => "Float",
            FieldKind::Decimal => "Decimal",
            FieldKind::Boolean => "Boolean",
            FieldKind::DateTime(_) => "DateTime",
            FieldKind::Date(_) => "Date",
            FieldKind::Time(_) => "Time",
            FieldKind::Uuid => "Uuid",
            FieldKind::Timestamp => "Timestamp",
            FieldKind::MsTimestamp => "MsTimestamp",
            FieldKind::Nested(_) => "Nested",
            FieldKind::Related(_) => "Related",
            FieldKind::FkNested(_) => "FkNested",
            FieldKind::ForeignKey(_) => "ForeignKey",
        }
    }
}

/// Field classes that can be instantiated from parameters alone.
///
/// Used by [`ModelConverter::register`](crate::convert::ModelConverter::register)
/// to map an attribute type onto a field without writing a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    Raw,
    String,
    Integer,
    Float,
    Decimal,
    Boolean,
    DateTime,
    Date,
    Time,
    Uuid,
    Timestamp,
    MsTimestamp,
    /// Raw foreign key; takes the key type from the attribute.
    ForeignKey,
}

impl FieldClass {
    /// Instantiate this class for `attr` with the given parameters.
    pub fn build(self, attr: &AttributeInfo, params: FieldParams) -> Field {
        let kind = match self {
            FieldClass::Raw => FieldKind::Raw,
            FieldClass::String => FieldKind::String,
            FieldClass::Integer => FieldKind::Integer,
            FieldClass::Float => FieldKind::Float,
            FieldClass::Decimal => FieldKind::Decimal,
            FieldClass::Boolean => FieldKind::Boolean,
            FieldClass::DateTime => FieldKind::DateTime(None),
            FieldClass::Date => FieldKind::Date(None),
            FieldClass::Time => FieldKind::Time(None),
            FieldClass::Uuid => FieldKind::Uuid,
            FieldClass::Timestamp => FieldKind::Timestamp,
            FieldClass::MsTimestamp => FieldKind::MsTimestamp,
            FieldClass::ForeignKey => FieldKind::ForeignKey(ForeignKeyField::new(
                attr.relation.as_ref().map(|rel| rel.key_type.clone()),
            )),
        };
        Field { kind, params, name: None }
    }
}

/// Parameters shared by every field kind.
#[derive(Debug, Clone, Default)]
pub struct FieldParams {
    /// Record attribute read on dump and written on load; defaults to the
    /// field name.
    pub attribute: Option<String>,
    /// External key; defaults to the field name.
    pub data_key: Option<String>,
    /// Absent keys are an error.
    pub required: bool,
    /// Null is accepted on load.
    pub allow_none: bool,
    /// Value used for absent keys on non-partial loads.
    pub load_default: Option<DefaultValue>,
    pub validators: Vec<Validator>,
    pub dump_only: bool,
    pub load_only: bool,
    pub metadata: IndexMap<String, Json>,
}

/// The result of loading one field.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedValue {
    Value(Value),
    /// A nested record loaded through a relation
    Record(Record),
    /// Records loaded through a reverse relation
    Many(Vec<Record>),
}

impl LoadedValue {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            LoadedValue::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            LoadedValue::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Render as JSON; records render their raw data.
    pub fn to_json(&self) -> Json {
        fn record_json(record: &Record) -> Json {
            Json::Object(
                record
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            )
        }
        match self {
            LoadedValue::Value(v) => v.to_json(),
            LoadedValue::Record(r) => record_json(r),
            LoadedValue::Many(rs) => Json::Array(rs.iter().map(record_json).collect()),
        }
    }
}

/// A serialization field.
#[derive(Debug, Clone)]
pub struct Field {
    pub kind: FieldKind,
    pub params: FieldParams,
    /// Name within the schema, set when bound.
    name: Option<String>,
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        Self::with_params(kind, FieldParams::default())
    }

    pub fn with_params(kind: FieldKind, params: FieldParams) -> Self {
        Self {
            kind,
            params,
            name: None,
        }
    }

    pub fn raw() -> Self {
        Self::new(FieldKind::Raw)
    }

    pub fn string() -> Self {
        Self::new(FieldKind::String)
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Integer)
    }

    pub fn float() -> Self {
        Self::new(FieldKind::Float)
    }

    pub fn decimal() -> Self {
        Self::new(FieldKind::Decimal)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn datetime() -> Self {
        Self::new(FieldKind::DateTime(None))
    }

    pub fn date() -> Self {
        Self::new(FieldKind::Date(None))
    }

    pub fn time() -> Self {
        Self::new(FieldKind::Time(None))
    }

    pub fn uuid() -> Self {
        Self::new(FieldKind::Uuid)
    }

    pub fn timestamp() -> Self {
        Self::new(FieldKind::Timestamp)
    }

    pub fn ms_timestamp() -> Self {
        Self::new(FieldKind::MsTimestamp)
    }

    pub fn nested(nested: Nested) -> Self {
        Self::new(FieldKind::Nested(nested))
    }

    pub fn related(related: Related) -> Self {
        Self::new(FieldKind::Related(related))
    }

    pub fn fk_nested(nested: FkNested) -> Self {
        Self::new(FieldKind::FkNested(nested))
    }

    /// Raw foreign key field with an optional key type.
    pub fn foreign_key(key_type: Option<AttributeType>) -> Self {
        Self::new(FieldKind::ForeignKey(ForeignKeyField::new(key_type)))
    }

    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.params.attribute = Some(name.into());
        self
    }

    pub fn data_key(mut self, key: impl Into<String>) -> Self {
        self.params.data_key = Some(key.into());
        self
    }

    pub fn required(mut self, value: bool) -> Self {
        self.params.required = value;
        self
    }

    pub fn allow_none(mut self, value: bool) -> Self {
        self.params.allow_none = value;
        self
    }

    pub fn load_default(mut self, value: impl Into<Value>) -> Self {
        self.params.load_default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.params.validators.push(validator);
        self
    }

    pub fn dump_only(mut self, value: bool) -> Self {
        self.params.dump_only = value;
        self
    }

    pub fn load_only(mut self, value: bool) -> Self {
        self.params.load_only = value;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.params.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the format of a datetime, date or time field.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        match &mut self.kind {
            FieldKind::DateTime(f) | FieldKind::Date(f) | FieldKind::Time(f) => {
                *f = Some(format.into());
            }
            other => {
                tracing::warn!(kind = other.name(), "Ignoring format on non-temporal field");
            }
        }
        self
    }

    /// Name within the schema, once bound.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Record attribute this field reads and writes.
    pub fn attribute_name(&self) -> &str {
        self.params
            .attribute
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default()
    }

    /// External key of this field.
    pub fn key(&self) -> &str {
        self.params
            .data_key
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_default()
    }

    /// Bind the field to a schema under `name`.
    ///
    /// Resolves schema-level options into the field: key rendering for
    /// foreign keys, temporal formats and the relation target of `Related`.
    pub fn bind(&mut self, name: &str, opts: &SchemaOpts, config: &Config) -> Result<()> {
        self.name = Some(name.to_string());
        let attribute = self.attribute_name().to_string();
        match &mut self.kind {
            FieldKind::ForeignKey(fk) => fk.string_keys = opts.string_keys,
            FieldKind::DateTime(format) if format.is_none() => {
                format.clone_from(&opts.datetimeformat);
            }
            FieldKind::Date(format) if format.is_none() => format.clone_from(&opts.dateformat),
            FieldKind::Time(format) if format.is_none() => format.clone_from(&opts.timeformat),
            FieldKind::Related(related) => {
                if let Some(model) = &opts.model {
                    related.bind_to(config, model, &attribute)?;
                }
            }
            FieldKind::FkNested(nested) => nested.bind(config),
            _ => {}
        }
        Ok(())
    }

    /// Render this field's value from `record`.
    ///
    /// Returns `None` when the record has nothing under the attribute, in
    /// which case the key is left out of the output.
    pub fn serialize(
        &self,
        record: &Record,
        source: Option<&dyn RecordSource>,
    ) -> Result<Option<Json>> {
        let attribute = self.attribute_name();
        match &self.kind {
            FieldKind::Nested(nested) => nested.serialize(record, attribute),
            FieldKind::Related(related) => related.serialize(record, attribute, source).map(Some),
            FieldKind::FkNested(nested) => nested.serialize(record, attribute).map(Some),
            FieldKind::ForeignKey(fk) => Ok(record.get(attribute).map(|v| fk.serialize(v))),
            kind => match record.get(attribute) {
                None => Ok(None),
                Some(value) => primitive::serialize(kind, value)
                    .map(Some)
                    .map_err(|mut err| {
                        err.attribute = Some(attribute.to_string());
                        Error::Type(err)
                    }),
            },
        }
    }

    /// Parse a non-null input value.
    ///
    /// Field-level failures are reported as a validation error whose paths
    /// are relative to this field ([`SCHEMA_ERROR_KEY`] for the field
    /// itself).
    pub fn deserialize(&self, input: &Json) -> Result<LoadedValue> {
        match &self.kind {
            FieldKind::Nested(nested) => nested.deserialize(input),
            FieldKind::Related(related) => related.deserialize(input, self.name().unwrap_or_default()),
            FieldKind::FkNested(nested) => nested.deserialize(input),
            FieldKind::ForeignKey(fk) => fk.deserialize(input).map(LoadedValue::Value),
            kind => primitive::deserialize(kind, input).map(LoadedValue::Value),
        }
    }

    /// Run every validator against a loaded value.
    pub fn run_validators(&self, loaded: &LoadedValue) -> ValidationError {
        let mut errors = ValidationError::new();
        if let LoadedValue::Value(value) = loaded {
            if !value.is_null() {
                for validator in &self.params.validators {
                    validator.validate(value, &mut errors);
                }
            }
        }
        errors
    }
}

/// Field-relative validation error with a single message.
pub(crate) fn invalid(message: impl Into<String>) -> Error {
    let mut errors = ValidationError::new();
    errors.add(SCHEMA_ERROR_KEY, ValidationErrorKind::Invalid, message);
    Error::Validation(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelschema_core::ModelDef;
    use serde_json::json;

    fn bound(mut field: Field, name: &str) -> Field {
        let config = Config::new();
        let opts = SchemaOpts::resolve(&crate::opts::Meta::new(), &config).unwrap();
        field.bind(name, &opts, &config).unwrap();
        field
    }

    #[test]
    fn keys_default_to_field_name() {
        let field = bound(Field::string(), "name");
        assert_eq!(field.key(), "name");
        assert_eq!(field.attribute_name(), "name");

        let field = bound(Field::string().attribute("title").data_key("jobTitle"), "t");
        assert_eq!(field.key(), "jobTitle");
        assert_eq!(field.attribute_name(), "title");
    }

    #[test]
    fn absent_attribute_is_skipped_on_dump() {
        let model = ModelDef::builder("Role").build();
        let record = Record::new(model);
        let field = bound(Field::string(), "missing");
        assert_eq!(field.serialize(&record, None).unwrap(), None);
    }

    #[test]
    fn class_builds_foreign_key_with_key_type() {
        let attr = AttributeInfo::foreign_key("owner", "Account").key_type(AttributeType::Uuid);
        let field = FieldClass::ForeignKey.build(&attr, FieldParams::default());
        match &field.kind {
            FieldKind::ForeignKey(fk) => assert_eq!(fk.key_type, Some(AttributeType::Uuid)),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn validators_skip_null_and_records() {
        let field = Field::string().validate(Validator::max_length(1));
        assert!(
            field
                .run_validators(&LoadedValue::Value(Value::Null))
                .is_empty()
        );
        assert_eq!(
            field
                .run_validators(&LoadedValue::Value(Value::from("ab")))
                .errors
                .len(),
            1
        );
    }

    #[test]
    fn loaded_value_json() {
        let model = ModelDef::builder("Role").build();
        let record = Record::new(model).with("id", 1);
        assert_eq!(LoadedValue::Record(record.clone()).to_json(), json!({"id": 1}));
        assert_eq!(LoadedValue::Many(vec![record]).to_json(), json!([{"id": 1}]));
    }

    #[test]
    fn format_applies_to_temporal_fields() {
        let field = Field::datetime().format("timestamp");
        assert!(matches!(field.kind, FieldKind::DateTime(Some(ref f)) if f == "timestamp"));
    }
}
