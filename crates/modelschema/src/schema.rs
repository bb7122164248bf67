//! Schemas: building, dumping and loading.
//!
//! A schema is built once from a [`SchemaBuilder`] and frozen. Building
//! resolves options (inheriting from a parent schema), binds relation fields,
//! derives one field per model attribute through the converter, layers the
//! declared fields over the derived ones and applies field selection.
//!
//! # Example
//!
//! ```ignore
//! let schema = SchemaBuilder::new("UserSchema")
//!     .meta(Meta::new().model_named("User"))
//!     .field("role", Field::related(Related::new()))
//!     .build(&config)?;
//!
//! let json = schema.dump(&user)?;
//! let user = schema.loader().instance(user).partial(true).load(&patch)?;
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value as Json;

use modelschema_core::{
    Error, Model, ModelDef, Record, RecordSource, Result, ValidationError, Value,
};

use crate::config::Config;
use crate::fields::{Field, LoadedValue};
use crate::opts::{Meta, SchemaOpts, Unknown};

/// Loaded data keyed by record attribute.
pub type LoadedData = IndexMap<String, LoadedValue>;

/// Builder for [`Schema`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    name: String,
    parent: Option<Schema>,
    meta: Option<Meta>,
    declared: IndexMap<String, Field>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            meta: None,
            declared: IndexMap::new(),
        }
    }

    /// Inherit declared fields and options from `parent`.
    pub fn extends(mut self, parent: &Schema) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Declare a field. Declared fields win over derived ones.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.declared.insert(name.into(), field);
        self
    }

    /// Freeze the schema.
    pub fn build(self, config: &Config) -> Result<Schema> {
        let meta = match (self.meta, &self.parent) {
            (Some(mut meta), Some(parent)) => {
                meta.inherit_from(&parent.inner.meta);
                meta
            }
            (Some(meta), None) => meta,
            (None, Some(parent)) => parent.inner.meta.clone(),
            (None, None) => Meta::default(),
        };
        let opts = SchemaOpts::resolve(&meta, config)?;

        let mut declared = self
            .parent
            .as_ref()
            .map(|p| p.inner.declared.clone())
            .unwrap_or_default();
        for (name, field) in self.declared {
            declared.insert(name, field);
        }

        let mut fields = match &opts.model {
            Some(model) => opts.model_converter.get_fields(model, &opts),
            None => IndexMap::new(),
        };
        for (name, field) in &declared {
            fields.insert(name.clone(), field.clone());
        }

        if let Some(only) = &opts.fields {
            check_names(&self.name, "fields", only, &fields)?;
            fields.retain(|name, _| only.contains(name));
        }
        check_names(&self.name, "exclude", &opts.exclude, &fields)?;
        fields.retain(|name, _| !opts.exclude.contains(name));

        check_names(&self.name, "dump_only", &opts.dump_only, &fields)?;
        check_names(&self.name, "load_only", &opts.load_only, &fields)?;
        for name in &opts.dump_only {
            if let Some(field) = fields.get_mut(name) {
                field.params.dump_only = true;
            }
        }
        for name in &opts.load_only {
            if let Some(field) = fields.get_mut(name) {
                field.params.load_only = true;
            }
        }

        for (name, field) in &mut fields {
            field.bind(name, &opts, config)?;
        }

        tracing::debug!(
            schema = %self.name,
            model = opts.model.as_ref().map(|m| m.name()),
            fields = fields.len(),
            "Built schema"
        );

        Ok(Schema {
            inner: Arc::new(SchemaInner {
                name: self.name,
                meta,
                declared,
                opts,
                fields,
                source: config.source().cloned(),
            }),
        })
    }
}

fn check_names(
    schema: &str,
    option: &str,
    names: &[String],
    fields: &IndexMap<String, Field>,
) -> Result<()> {
    let invalid: Vec<&str> = names
        .iter()
        .filter(|n| !fields.contains_key(n.as_str()))
        .map(String::as_str)
        .collect();
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(Error::config(format!(
            "Invalid fields for {} in `{}`: {}",
            schema,
            option,
            invalid.join(", ")
        )))
    }
}

struct SchemaInner {
    name: String,
    /// Resolved for inheritance; children inherit from this
    meta: Meta,
    /// Unbound declared fields, including inherited ones
    declared: IndexMap<String, Field>,
    opts: SchemaOpts,
    fields: IndexMap<String, Field>,
    source: Option<Arc<dyn RecordSource>>,
}

/// A frozen schema. Cheap to clone.
#[derive(Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.inner.name)
            .field("model", &self.inner.opts.model.as_ref().map(|m| m.name()))
            .field("fields", &self.inner.fields.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn opts(&self) -> &SchemaOpts {
        &self.inner.opts
    }

    pub fn model(&self) -> Option<&Arc<ModelDef>> {
        self.inner.opts.model.as_ref()
    }

    /// Bound fields in order.
    pub fn fields(&self) -> &IndexMap<String, Field> {
        &self.inner.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.inner.fields.get(name)
    }

    /// The meta this schema resolved, after inheritance.
    pub fn meta(&self) -> &Meta {
        &self.inner.meta
    }

    // ------------------------------------------------------------------
    // Dump
    // ------------------------------------------------------------------

    /// Render a record.
    pub fn dump(&self, record: &Record) -> Result<Json> {
        tracing::trace!(schema = %self.inner.name, model = record.model_name(), "dump");
        let source = self.inner.source.as_deref();
        let mut out = serde_json::Map::new();
        for field in self.inner.fields.values() {
            if field.params.load_only {
                continue;
            }
            if let Some(value) = field.serialize(record, source)? {
                out.insert(field.key().to_string(), value);
            }
        }
        Ok(Json::Object(out))
    }

    pub fn dump_many(&self, records: &[Record]) -> Result<Json> {
        records
            .iter()
            .map(|r| self.dump(r))
            .collect::<Result<Vec<_>>>()
            .map(Json::Array)
    }

    /// Render a record as JSON text.
    pub fn dumps(&self, record: &Record) -> Result<String> {
        Ok(serde_json::to_string(&self.dump(record)?)?)
    }

    pub fn dump_model<M: Model>(&self, value: &M) -> Result<Json> {
        self.dump(&value.to_record())
    }

    // ------------------------------------------------------------------
    // Load
    // ------------------------------------------------------------------

    /// Start a load with per-call options.
    pub fn loader(&self) -> Loader<'_> {
        Loader {
            schema: self,
            instance: None,
            partial: Partial::None,
            unknown: None,
        }
    }

    pub fn load(&self, input: &Json) -> Result<Record> {
        self.loader().load(input)
    }

    pub fn load_many(&self, input: &Json) -> Result<Vec<Record>> {
        self.loader().load_many(input)
    }

    pub fn loads(&self, text: &str) -> Result<Record> {
        self.loader().loads(text)
    }

    /// Validate and parse without building a record.
    pub fn load_data(&self, input: &Json) -> Result<LoadedData> {
        self.loader().load_data(input)
    }

    pub fn load_model<M: Model>(&self, input: &Json) -> Result<M> {
        M::from_record(&self.load(input)?)
    }

    /// Load used by nested fields: a record when the schema has a model,
    /// otherwise the loaded data as JSON.
    pub(crate) fn load_nested(&self, input: &Json) -> Result<LoadedValue> {
        let loader = self.loader();
        let data = loader.deserialize(input)?;
        if self.model().is_some() {
            loader.make_instance(data).map(LoadedValue::Record)
        } else {
            let object = data
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            Ok(LoadedValue::Value(Value::Json(Json::Object(object))))
        }
    }
}

#[derive(Debug, Clone)]
enum Partial {
    None,
    All,
    Fields(HashSet<String>),
}

/// Per-call load options.
#[derive(Debug)]
pub struct Loader<'a> {
    schema: &'a Schema,
    instance: Option<Record>,
    partial: Partial,
    unknown: Option<Unknown>,
}

impl Loader<'_> {
    /// Update `record` instead of creating a new one.
    pub fn instance(mut self, record: Record) -> Self {
        self.instance = Some(record);
        self
    }

    /// Skip required checks and defaults for every absent key.
    pub fn partial(mut self, value: bool) -> Self {
        self.partial = if value { Partial::All } else { Partial::None };
        self
    }

    /// Skip required checks and defaults for these absent fields only.
    pub fn partial_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partial = Partial::Fields(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Override the schema's unknown key handling.
    pub fn unknown(mut self, unknown: Unknown) -> Self {
        self.unknown = Some(unknown);
        self
    }

    fn is_partial(&self, name: &str) -> bool {
        match &self.partial {
            Partial::None => false,
            Partial::All => true,
            Partial::Fields(fields) => fields.contains(name),
        }
    }

    /// Load into a record.
    pub fn load(self, input: &Json) -> Result<Record> {
        let data = self.deserialize(input)?;
        self.make_instance(data)
    }

    /// Load a list of objects. An attached instance is ignored.
    pub fn load_many(self, input: &Json) -> Result<Vec<Record>> {
        let Json::Array(items) = input else {
            let mut errors = ValidationError::new();
            errors.add_schema_error("Invalid input type.");
            return Err(errors.into());
        };
        let mut errors = ValidationError::new();
        let mut records = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match self.deserialize(item).and_then(|data| self.build_record(data, None)) {
                Ok(record) => records.push(record),
                Err(Error::Validation(nested)) => errors.extend_prefixed(&i.to_string(), nested),
                Err(err) => return Err(err),
            }
        }
        errors.into_result()?;
        Ok(records)
    }

    /// Load from JSON text.
    pub fn loads(self, text: &str) -> Result<Record> {
        let input: Json = serde_json::from_str(text)?;
        self.load(&input)
    }

    /// Validate and parse without building a record.
    pub fn load_data(self, input: &Json) -> Result<LoadedData> {
        self.deserialize(input)
    }

    fn deserialize(&self, input: &Json) -> Result<LoadedData> {
        let schema = &self.schema.inner;
        tracing::trace!(schema = %schema.name, "load");

        let mut errors = ValidationError::new();
        let Json::Object(object) = input else {
            errors.add_schema_error("Invalid input type.");
            return Err(errors.into());
        };

        let mut data = LoadedData::new();
        let mut known: HashSet<&str> = HashSet::new();
        for (name, field) in &schema.fields {
            if field.params.dump_only {
                continue;
            }
            let key = field.key();
            known.insert(key);
            let attribute = field.attribute_name().to_string();

            match object.get(key) {
                None => {
                    if self.is_partial(name) {
                        continue;
                    }
                    if field.params.required {
                        errors.add_required(key);
                    } else if let Some(default) = &field.params.load_default {
                        data.insert(attribute, LoadedValue::Value(default.resolve()));
                    }
                }
                Some(Json::Null) => {
                    if field.params.allow_none {
                        data.insert(attribute, LoadedValue::Value(Value::Null));
                    } else {
                        errors.add_null(key);
                    }
                }
                Some(raw) => match field.deserialize(raw) {
                    Ok(loaded) => {
                        let failed = field.run_validators(&loaded);
                        if failed.is_empty() {
                            data.insert(attribute, loaded);
                        } else {
                            errors.extend_prefixed(key, failed);
                        }
                    }
                    Err(Error::Validation(failed)) => errors.extend_prefixed(key, failed),
                    Err(err) => return Err(err),
                },
            }
        }

        let unknown = self.unknown.unwrap_or(schema.opts.unknown);
        for (key, raw) in object {
            if known.contains(key.as_str()) {
                continue;
            }
            match unknown {
                Unknown::Raise => errors.add_unknown(key.as_str()),
                Unknown::Exclude => {}
                Unknown::Include => {
                    data.insert(key.clone(), LoadedValue::Value(Value::from_json(raw)));
                }
            }
        }

        errors.into_result()?;
        Ok(data)
    }

    fn make_instance(&self, data: LoadedData) -> Result<Record> {
        self.build_record(data, self.instance.clone())
    }

    /// Write loaded data onto `instance`, or onto a new record with model
    /// defaults.
    fn build_record(&self, data: LoadedData, instance: Option<Record>) -> Result<Record> {
        let schema = &self.schema.inner;
        let model = schema.opts.model.as_ref().ok_or_else(|| {
            Error::config(format!(
                "{} has no model to load into; use load_data",
                schema.name
            ))
        })?;
        let mut record = instance.unwrap_or_else(|| Record::new(Arc::clone(model)));

        for (attribute, loaded) in data {
            // backrefs are named after the reverse relation, not an attribute
            let loaded = match loaded {
                LoadedValue::Many(records) => {
                    record.set_backrefs(&attribute, records);
                    continue;
                }
                other => other,
            };
            let Some(attr) = model.attribute(&attribute) else {
                tracing::warn!(
                    schema = %schema.name,
                    attribute = %attribute,
                    "Loaded key is not a model attribute, skipping"
                );
                continue;
            };
            match loaded {
                LoadedValue::Value(value) => {
                    let value = attr.coerce_value(&value).unwrap_or(value);
                    record.set(&attribute, value)?;
                }
                LoadedValue::Record(related) if attr.is_relation() => {
                    record.set_related(&attribute, related)?;
                }
                LoadedValue::Record(_) => {
                    tracing::warn!(
                        schema = %schema.name,
                        attribute = %attribute,
                        "Nested record loaded for a non-relation attribute, skipping"
                    );
                }
                LoadedValue::Many(_) => {}
            }
        }
        Ok(record)
    }
}
