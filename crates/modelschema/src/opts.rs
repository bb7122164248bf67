//! Schema options.
//!
//! [`Meta`] is what a schema declares; every option is optional. Building a
//! schema resolves it against its parent's `Meta` and the [`Config`]
//! defaults into a [`SchemaOpts`].

use std::sync::Arc;

use modelschema_core::{Error, ModelDef, Result};

use crate::config::Config;
use crate::convert::ModelConverter;

/// Options a child schema takes from its parent's `Meta` when it does not
/// set them itself.
pub const INHERITANCE_OPTIONS: &[&str] = &[
    "model",
    "model_converter",
    "dump_only_pk",
    "string_keys",
    "id_keys",
    "datetimeformat",
    "dateformat",
    "timeformat",
    "unknown",
];

/// Handling of input keys that match no loadable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unknown {
    /// Report an "Unknown field." error.
    #[default]
    Raise,
    /// Drop the key.
    Exclude,
    /// Keep the key with its raw value.
    Include,
}

/// Reference to the model of a schema.
#[derive(Debug, Clone)]
pub enum ModelRef {
    Def(Arc<ModelDef>),
    /// Resolved through the configuration's registry.
    Named(String),
}

/// Declared schema options.
#[derive(Debug, Clone, Default)]
pub struct Meta {
    pub model: Option<ModelRef>,
    pub model_converter: Option<ModelConverter>,
    pub dump_only_pk: Option<bool>,
    pub string_keys: Option<bool>,
    pub id_keys: Option<bool>,
    /// Only these fields, when set
    pub fields: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub dump_only: Option<Vec<String>>,
    pub load_only: Option<Vec<String>>,
    pub unknown: Option<Unknown>,
    pub datetimeformat: Option<String>,
    pub dateformat: Option<String>,
    pub timeformat: Option<String>,
}

fn names<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: Arc<ModelDef>) -> Self {
        self.model = Some(ModelRef::Def(model));
        self
    }

    /// Refer to a registered model by name.
    pub fn model_named(mut self, name: impl Into<String>) -> Self {
        self.model = Some(ModelRef::Named(name.into()));
        self
    }

    pub fn converter(mut self, converter: ModelConverter) -> Self {
        self.model_converter = Some(converter);
        self
    }

    pub fn dump_only_pk(mut self, value: bool) -> Self {
        self.dump_only_pk = Some(value);
        self
    }

    pub fn string_keys(mut self, value: bool) -> Self {
        self.string_keys = Some(value);
        self
    }

    pub fn id_keys(mut self, value: bool) -> Self {
        self.id_keys = Some(value);
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(names(fields));
        self
    }

    /// Add to the excluded fields.
    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.get_or_insert_with(Vec::new).extend(names(fields));
        self
    }

    pub fn dump_only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dump_only = Some(names(fields));
        self
    }

    pub fn load_only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.load_only = Some(names(fields));
        self
    }

    pub fn unknown(mut self, unknown: Unknown) -> Self {
        self.unknown = Some(unknown);
        self
    }

    pub fn datetimeformat(mut self, format: impl Into<String>) -> Self {
        self.datetimeformat = Some(format.into());
        self
    }

    pub fn dateformat(mut self, format: impl Into<String>) -> Self {
        self.dateformat = Some(format.into());
        self
    }

    pub fn timeformat(mut self, format: impl Into<String>) -> Self {
        self.timeformat = Some(format.into());
        self
    }

    /// Fill the [`INHERITANCE_OPTIONS`] this `Meta` leaves unset from
    /// `parent`.
    pub fn inherit_from(&mut self, parent: &Meta) {
        fn fill<T: Clone>(own: &mut Option<T>, parent: &Option<T>) {
            if own.is_none() {
                own.clone_from(parent);
            }
        }
        fill(&mut self.model, &parent.model);
        fill(&mut self.model_converter, &parent.model_converter);
        fill(&mut self.dump_only_pk, &parent.dump_only_pk);
        fill(&mut self.string_keys, &parent.string_keys);
        fill(&mut self.id_keys, &parent.id_keys);
        fill(&mut self.datetimeformat, &parent.datetimeformat);
        fill(&mut self.dateformat, &parent.dateformat);
        fill(&mut self.timeformat, &parent.timeformat);
        fill(&mut self.unknown, &parent.unknown);
    }
}

/// Resolved schema options.
#[derive(Debug, Clone)]
pub struct SchemaOpts {
    pub model: Option<Arc<ModelDef>>,
    pub model_converter: ModelConverter,
    pub dump_only_pk: bool,
    pub string_keys: bool,
    pub id_keys: bool,
    pub fields: Option<Vec<String>>,
    pub exclude: Vec<String>,
    pub dump_only: Vec<String>,
    pub load_only: Vec<String>,
    pub unknown: Unknown,
    pub datetimeformat: Option<String>,
    pub dateformat: Option<String>,
    pub timeformat: Option<String>,
}

impl SchemaOpts {
    /// Resolve `meta` against the configuration.
    pub fn resolve(meta: &Meta, config: &Config) -> Result<Self> {
        let model = match &meta.model {
            None => None,
            Some(ModelRef::Def(model)) => Some(Arc::clone(model)),
            Some(ModelRef::Named(name)) => Some(
                config
                    .registry()
                    .get(name)
                    .ok_or_else(|| Error::config(format!("unknown model '{}'", name)))?,
            ),
        };
        let defaults = config.defaults();
        Ok(Self {
            model,
            model_converter: meta
                .model_converter
                .clone()
                .unwrap_or_else(|| config.converter().clone()),
            dump_only_pk: meta.dump_only_pk.unwrap_or(defaults.dump_only_pk),
            string_keys: meta.string_keys.unwrap_or(defaults.string_keys),
            id_keys: meta.id_keys.unwrap_or(defaults.id_keys),
            fields: meta.fields.clone(),
            exclude: meta.exclude.clone().unwrap_or_default(),
            dump_only: meta.dump_only.clone().unwrap_or_default(),
            load_only: meta.load_only.clone().unwrap_or_default(),
            unknown: meta.unknown.unwrap_or_default(),
            datetimeformat: meta.datetimeformat.clone(),
            dateformat: meta.dateformat.clone(),
            timeformat: meta.timeformat.clone(),
        })
    }
}
