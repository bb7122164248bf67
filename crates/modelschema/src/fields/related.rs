//! Relation fields.
//!
//! - [`Nested`] embeds another schema.
//! - [`Related`] embeds the schema of a relation target, resolved from the
//!   model registry when the owning schema is built. Works for foreign keys
//!   (one record) and backrefs (many records).
//! - [`FkNested`] embeds a foreign key target that is already cached on the
//!   record, and never looks records up.
//! - [`ForeignKeyField`] renders the raw stored key.

use std::sync::{Arc, OnceLock};

use serde_json::Value as Json;

use modelschema_core::{
    AttributeType, BindingError, Error, ModelDef, Record, RecordSource, Result, ReverseRelation,
    ValidationError, Value,
};

use super::{LoadedValue, invalid};
use crate::config::Config;
use crate::opts::Meta;
use crate::schema::{Schema, SchemaBuilder};

/// Build a schema for `model` from nested options.
fn synthesize(model: &Arc<ModelDef>, meta: Meta, config: &Config) -> Result<Schema> {
    SchemaBuilder::new(format!("{}Schema", model.name()))
        .meta(meta.model(Arc::clone(model)))
        .build(config)
}

/// Return the cached schema, building it on first use.
fn cached(cell: &OnceLock<Schema>, build: impl FnOnce() -> Result<Schema>) -> Result<Schema> {
    if let Some(schema) = cell.get() {
        return Ok(schema.clone());
    }
    let schema = build()?;
    // A concurrent first use may have won; either schema is equivalent.
    Ok(cell.get_or_init(|| schema).clone())
}

/// Load a list of nested objects, prefixing errors with the item index.
fn load_list(schema: &Schema, input: &Json) -> Result<Vec<LoadedValue>> {
    let Json::Array(items) = input else {
        return Err(invalid("Invalid type."));
    };
    let mut errors = ValidationError::new();
    let mut loaded = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match schema.load_nested(item) {
            Ok(value) => loaded.push(value),
            Err(Error::Validation(nested)) => errors.extend_prefixed(&i.to_string(), nested),
            Err(err) => return Err(err),
        }
    }
    errors.into_result()?;
    Ok(loaded)
}

/// Collapse loaded list items into records when the schema builds records.
fn collect_many(items: Vec<LoadedValue>) -> LoadedValue {
    if items.iter().all(|v| matches!(v, LoadedValue::Record(_))) {
        LoadedValue::Many(
            items
                .into_iter()
                .filter_map(|v| match v {
                    LoadedValue::Record(r) => Some(r),
                    _ => None,
                })
                .collect(),
        )
    } else {
        LoadedValue::Value(Value::Json(Json::Array(
            items.iter().map(LoadedValue::to_json).collect(),
        )))
    }
}

/// A field embedding another schema.
#[derive(Debug, Clone)]
pub struct Nested {
    schema: Schema,
    many: bool,
}

impl Nested {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            many: false,
        }
    }

    pub fn many(mut self, value: bool) -> Self {
        self.many = value;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(super) fn serialize(&self, record: &Record, attribute: &str) -> Result<Option<Json>> {
        if self.many {
            return match record.backrefs(attribute) {
                Some(records) => self.schema.dump_many(records).map(Some),
                None => Ok(None),
            };
        }
        if let Some(related) = record.related(attribute) {
            return self.schema.dump(related).map(Some);
        }
        match record.get(attribute) {
            Some(Value::Null) => Ok(Some(Json::Null)),
            _ => Ok(None),
        }
    }

    pub(super) fn deserialize(&self, input: &Json) -> Result<LoadedValue> {
        if self.many {
            load_list(&self.schema, input).map(collect_many)
        } else {
            self.schema.load_nested(input)
        }
    }
}

#[derive(Debug)]
struct RelatedBinding {
    target: Arc<ModelDef>,
    /// Key type of the target; used for scalar shorthand on load
    key_type: AttributeType,
    reverse: Option<ReverseRelation>,
    config: Config,
}

/// Find the relation `name` of `model`: a foreign key attribute, or a
/// backref another model points at it with. The flag is set for backrefs.
fn resolve(config: &Config, model: &ModelDef, name: &str) -> Result<(RelatedBinding, bool)> {
    let registry = config.registry();
    if let Some(rel) = model.attribute(name).and_then(|a| a.relation.as_ref()) {
        let target = registry.get(&rel.model).ok_or_else(|| {
            Error::config(format!(
                "{}.{} references unknown model '{}'",
                model.name(),
                name,
                rel.model
            ))
        })?;
        let binding = RelatedBinding {
            target,
            key_type: rel.key_type.clone(),
            reverse: None,
            config: config.clone(),
        };
        Ok((binding, false))
    } else if let Some(reverse) = registry.reverse_relation(model.name(), name) {
        let binding = RelatedBinding {
            target: Arc::clone(&reverse.owner),
            key_type: reverse.owner.primary_key().ty.clone(),
            reverse: Some(reverse),
            config: config.clone(),
        };
        Ok((binding, true))
    } else {
        Err(Error::config(format!(
            "'{}' is not a relation of model '{}'",
            name,
            model.name()
        )))
    }
}

/// Nested field for a relation of the schema's model.
///
/// The relation is looked up by the field's attribute name: a foreign key
/// attribute on the model (one record), or a backref pointing at the model
/// (many records). Unless an explicit schema is given, the nested schema is
/// synthesized for the relation target on first use, honouring the field's
/// own [`Meta`] options (`fields`, `exclude`, `unknown`, ...).
#[derive(Debug, Clone, Default)]
pub struct Related {
    schema: Option<Schema>,
    meta: Meta,
    binding: Option<Arc<RelatedBinding>>,
    many: bool,
    nested: Arc<OnceLock<Schema>>,
}

impl Related {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `schema` instead of synthesizing one.
    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema: Some(schema),
            ..Self::default()
        }
    }

    /// Options of the synthesized nested schema. The model is always the
    /// relation target.
    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    /// Restrict the synthesized nested schema to `fields`.
    pub fn only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta = self.meta.fields(fields);
        self
    }

    /// Leave `fields` out of the synthesized nested schema.
    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.meta = self.meta.exclude(fields);
        self
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Whether this is a reverse (one-to-many) relation.
    pub fn is_many(&self) -> bool {
        self.many
    }

    /// The relation target, once bound.
    pub fn target(&self) -> Option<&Arc<ModelDef>> {
        self.binding.as_ref().map(|b| &b.target)
    }

    /// Whether a nested schema was given up front.
    pub fn has_schema(&self) -> bool {
        self.schema.is_some()
    }

    /// Resolve the relation `name` of `model`.
    pub fn init_model(&mut self, config: &Config, model: &ModelDef, name: &str) -> Result<()> {
        let (binding, many) = resolve(config, model, name)?;
        self.apply(binding, many, model, name);
        Ok(())
    }

    /// Bind to the schema's model.
    ///
    /// A field with its own schema is only bound when `name` resolves to a
    /// relation, which gives scalar input a key type. It is left unbound
    /// otherwise.
    pub fn bind_to(&mut self, config: &Config, model: &ModelDef, name: &str) -> Result<()> {
        if self.schema.is_none() {
            return self.init_model(config, model, name);
        }
        match resolve(config, model, name) {
            Ok((binding, many)) => self.apply(binding, many, model, name),
            Err(err) => tracing::trace!(
                model = model.name(),
                field = name,
                reason = %err,
                "Related field keeps its own schema unbound"
            ),
        }
        Ok(())
    }

    fn apply(&mut self, binding: RelatedBinding, many: bool, model: &ModelDef, name: &str) {
        tracing::trace!(
            model = model.name(),
            relation = name,
            target = binding.target.name(),
            many,
            "Bound related field"
        );
        self.many = many;
        self.binding = Some(Arc::new(binding));
        self.nested = Arc::new(OnceLock::new());
    }

    /// The nested schema, synthesizing it on first use.
    pub fn nested_schema(&self) -> Result<Schema> {
        if let Some(schema) = &self.schema {
            return Ok(schema.clone());
        }
        let binding = self.binding.as_ref().ok_or_else(|| {
            Error::Binding(BindingError {
                field: String::new(),
                message: "related field has no schema and is not bound to a model".to_string(),
            })
        })?;
        cached(&self.nested, || {
            synthesize(&binding.target, self.meta.clone(), &binding.config)
        })
    }

    pub(super) fn serialize(
        &self,
        record: &Record,
        attribute: &str,
        source: Option<&dyn RecordSource>,
    ) -> Result<Json> {
        let nested = self.nested_schema()?;

        if self.many {
            if let Some(records) = record.backrefs(attribute) {
                return nested.dump_many(records);
            }
            // nothing can point at a record that was never saved
            if record.pk().is_null() {
                return Ok(Json::Array(Vec::new()));
            }
            let reverse = self.binding.as_ref().and_then(|b| b.reverse.as_ref());
            if let (Some(reverse), Some(source)) = (reverse, source) {
                let records =
                    source.select_by(reverse.owner.name(), &reverse.attribute, record.pk())?;
                return nested.dump_many(&records);
            }
            return Ok(Json::Array(Vec::new()));
        }

        if let Some(related) = record.related(attribute) {
            return nested.dump(related);
        }
        let key = record.value(attribute);
        if key.is_null() {
            return Ok(Json::Null);
        }
        match (&self.binding, source) {
            (Some(binding), Some(source)) => match source.fetch(binding.target.name(), key)? {
                Some(related) => nested.dump(&related),
                None => Err(Error::Custom(format!(
                    "{} with key {} does not exist",
                    binding.target.name(),
                    key
                ))),
            },
            _ => Err(Error::Custom(format!(
                "relation '{}' is not loaded and no record source is configured",
                attribute
            ))),
        }
    }

    pub(super) fn deserialize(&self, input: &Json, field: &str) -> Result<LoadedValue> {
        let Some(binding) = &self.binding else {
            return match (&self.schema, input) {
                (Some(schema), Json::Object(_)) => schema.load_nested(input),
                (Some(schema), Json::Array(_)) => load_list(schema, input).map(collect_many),
                _ => Err(Error::Binding(BindingError {
                    field: field.to_string(),
                    message: "init model first".to_string(),
                })),
            };
        };
        let nested = self.nested_schema()?;

        if self.many {
            return load_list(&nested, input).map(collect_many);
        }
        if input.is_object() {
            return nested.load_nested(input);
        }
        binding
            .key_type
            .coerce(&Value::from_json(input))
            .map(LoadedValue::Value)
            .map_err(|err| invalid(err.to_string()))
    }
}

#[derive(Debug, Clone)]
enum FkTarget {
    Schema(Schema),
    Model {
        model: Arc<ModelDef>,
        only: Option<Vec<String>>,
        exclude: Vec<String>,
    },
}

/// Nested field reading a foreign key target from the record's relation
/// cache.
#[derive(Debug, Clone)]
pub struct FkNested {
    target: FkTarget,
    config: Option<Config>,
    nested: Arc<OnceLock<Schema>>,
}

impl FkNested {
    /// Nest with an explicit schema.
    pub fn schema(schema: Schema) -> Self {
        Self {
            target: FkTarget::Schema(schema),
            config: None,
            nested: Arc::new(OnceLock::new()),
        }
    }

    /// Nest with a schema synthesized for `model`.
    pub fn model(model: Arc<ModelDef>) -> Self {
        Self {
            target: FkTarget::Model {
                model,
                only: None,
                exclude: Vec::new(),
            },
            config: None,
            nested: Arc::new(OnceLock::new()),
        }
    }

    /// Restrict a synthesized schema to `fields`.
    pub fn only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let FkTarget::Model { only, .. } = &mut self.target {
            *only = Some(fields.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Leave `fields` out of a synthesized schema.
    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let FkTarget::Model { exclude, .. } = &mut self.target {
            exclude.extend(fields.into_iter().map(Into::into));
        }
        self
    }

    pub(super) fn bind(&mut self, config: &Config) {
        self.config = Some(config.clone());
        self.nested = Arc::new(OnceLock::new());
    }

    pub fn nested_schema(&self) -> Result<Schema> {
        match &self.target {
            FkTarget::Schema(schema) => Ok(schema.clone()),
            FkTarget::Model {
                model,
                only,
                exclude,
            } => {
                let config = self.config.as_ref().ok_or_else(|| {
                    Error::Binding(BindingError {
                        field: String::new(),
                        message: "nested field used before its schema was built".to_string(),
                    })
                })?;
                cached(&self.nested, || {
                    let mut meta = Meta::new().exclude(exclude.iter().cloned());
                    if let Some(only) = only {
                        meta = meta.fields(only.iter().cloned());
                    }
                    synthesize(model, meta, config)
                })
            }
        }
    }

    pub(super) fn serialize(&self, record: &Record, attribute: &str) -> Result<Json> {
        if record.value(attribute).is_null() {
            return Ok(Json::Null);
        }
        match record.related(attribute) {
            Some(related) => self.nested_schema()?.dump(related),
            None => {
                tracing::warn!(
                    model = record.model_name(),
                    relation = attribute,
                    "Related record not cached, dumping null"
                );
                Ok(Json::Null)
            }
        }
    }

    pub(super) fn deserialize(&self, input: &Json) -> Result<LoadedValue> {
        self.nested_schema()?.load_nested(input)
    }
}

/// Raw foreign key field.
#[derive(Debug, Clone, Default)]
pub struct ForeignKeyField {
    /// Key type of the referenced model, when known
    pub key_type: Option<AttributeType>,
    /// Render keys as strings; resolved from the schema on bind
    pub string_keys: bool,
}

impl ForeignKeyField {
    pub fn new(key_type: Option<AttributeType>) -> Self {
        Self {
            key_type,
            string_keys: false,
        }
    }

    pub(super) fn serialize(&self, value: &Value) -> Json {
        match value {
            Value::Null => Json::Null,
            v if self.string_keys => Json::String(v.to_string()),
            v => v.to_json(),
        }
    }

    pub(super) fn deserialize(&self, input: &Json) -> Result<Value> {
        let value = Value::from_json(input);
        match &self.key_type {
            Some(ty) => ty.coerce(&value).map_err(|err| invalid(err.to_string())),
            None => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn foreign_key_rendering() {
        let mut fk = ForeignKeyField::new(Some(AttributeType::Auto));
        assert_eq!(fk.serialize(&Value::BigInt(7)), json!(7));
        fk.string_keys = true;
        assert_eq!(fk.serialize(&Value::BigInt(7)), json!("7"));
        assert_eq!(fk.serialize(&Value::Null), Json::Null);
    }

    #[test]
    fn foreign_key_load_coerces_through_key_type() {
        let fk = ForeignKeyField::new(Some(AttributeType::Auto));
        assert_eq!(fk.deserialize(&json!("7")).unwrap(), Value::BigInt(7));
        let err = fk.deserialize(&json!("seven")).unwrap_err();
        assert_eq!(
            err.validation().unwrap().errors[0].message,
            "expected integer, found 'seven'"
        );

        let untyped = ForeignKeyField::default();
        assert_eq!(untyped.deserialize(&json!("x")).unwrap(), Value::from("x"));
    }

    #[test]
    fn unbound_related_cannot_load() {
        let related = Related::new();
        let err = related.deserialize(&json!(1), "role").unwrap_err();
        assert!(matches!(err, Error::Binding(ref b) if b.field == "role"));
        assert!(related.nested_schema().is_err());
    }
}
