//! Attribute definitions.

use std::fmt;
use std::sync::Arc;

use crate::error::TypeError;
use crate::types::AttributeType;
use crate::value::Value;

/// Function computing a fresh default value on every use.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Function replacing the attribute type's native coercion.
pub type CoerceFn = Arc<dyn Fn(&Value) -> Result<Value, TypeError> + Send + Sync>;

/// Declared default of an attribute.
#[derive(Clone)]
pub enum DefaultValue {
    /// A constant value
    Value(Value),
    /// A callable evaluated each time the default is needed
    Factory(DefaultFactory),
}

impl DefaultValue {
    /// Produce the default value.
    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Value(v) => v.clone(),
            DefaultValue::Factory(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            DefaultValue::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Foreign key metadata of a relation attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyInfo {
    /// Name of the referenced model
    pub model: String,
    /// Type of the referenced model's primary key
    pub key_type: AttributeType,
    /// Name of the reverse relation on the referenced model
    pub backref: Option<String>,
    /// Whether the target is resolved by name after declaration
    pub deferred: bool,
}

impl ForeignKeyInfo {
    /// Reference `model` through an auto-incrementing key.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            key_type: AttributeType::Auto,
            backref: None,
            deferred: false,
        }
    }

    /// The reverse relation name as seen from the referenced model.
    ///
    /// Defaults to `<lowercase owner>_set`.
    pub fn backref_name(&self, owner: &str) -> String {
        self.backref
            .clone()
            .unwrap_or_else(|| format!("{}_set", owner.to_lowercase()))
    }
}

/// Metadata about a model attribute.
#[derive(Clone)]
pub struct AttributeInfo {
    /// Logical attribute name
    pub name: String,
    /// Storage name (`<name>_id` for foreign keys)
    pub column_name: String,
    /// Native kind
    pub ty: AttributeType,
    /// Whether null is an acceptable value
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    /// Accepted values paired with display labels
    pub choices: Vec<(Value, String)>,
    pub help_text: Option<String>,
    pub max_length: Option<usize>,
    pub primary_key: bool,
    /// Set for `ForeignKey` and `DeferredForeignKey` attributes
    pub relation: Option<ForeignKeyInfo>,
    /// Overrides the native coercion of `ty`
    pub coerce: Option<CoerceFn>,
}

impl AttributeInfo {
    /// Create an attribute with minimal required data.
    pub fn new(name: impl Into<String>, ty: AttributeType) -> Self {
        let name = name.into();
        Self {
            column_name: name.clone(),
            name,
            ty,
            nullable: false,
            default: None,
            choices: Vec::new(),
            help_text: None,
            max_length: None,
            primary_key: false,
            relation: None,
            coerce: None,
        }
    }

    /// Bounded text attribute.
    pub fn char(name: impl Into<String>, max_length: usize) -> Self {
        Self::new(name, AttributeType::Char).max_length(max_length)
    }

    /// Auto-incrementing primary key.
    pub fn auto(name: impl Into<String>) -> Self {
        Self::new(name, AttributeType::Auto).primary_key(true)
    }

    /// Foreign key to `model`, stored under `<name>_id`.
    pub fn foreign_key(name: impl Into<String>, model: impl Into<String>) -> Self {
        let mut attr = Self::new(name, AttributeType::ForeignKey);
        attr.column_name = format!("{}_id", attr.name);
        attr.relation = Some(ForeignKeyInfo::new(model));
        attr
    }

    /// Foreign key to a model that is declared later.
    pub fn deferred_foreign_key(name: impl Into<String>, model: impl Into<String>) -> Self {
        let mut attr = Self::foreign_key(name, model);
        attr.ty = AttributeType::DeferredForeignKey;
        if let Some(rel) = attr.relation.as_mut() {
            rel.deferred = true;
        }
        attr
    }

    /// Set the storage name.
    pub fn column(mut self, name: impl Into<String>) -> Self {
        self.column_name = name.into();
        self
    }

    /// Set nullable flag.
    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = value;
        self
    }

    /// Set primary key flag.
    pub fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    /// Set a constant default.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    /// Set a default computed on each use.
    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Factory(Arc::new(factory)));
        self
    }

    /// Restrict values to `choices`, given as `(value, label)` pairs.
    pub fn choices<I, V, L>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = (V, L)>,
        V: Into<Value>,
        L: Into<String>,
    {
        self.choices = choices
            .into_iter()
            .map(|(value, label)| (value.into(), label.into()))
            .collect();
        self
    }

    pub fn help_text(mut self, text: impl Into<String>) -> Self {
        self.help_text = Some(text.into());
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Set the referenced key type. No effect on non-relation attributes.
    pub fn key_type(mut self, ty: AttributeType) -> Self {
        if let Some(rel) = self.relation.as_mut() {
            rel.key_type = ty;
        }
        self
    }

    /// Set the reverse relation name. No effect on non-relation attributes.
    pub fn backref(mut self, name: impl Into<String>) -> Self {
        if let Some(rel) = self.relation.as_mut() {
            rel.backref = Some(name.into());
        }
        self
    }

    /// Replace the native coercion.
    pub fn coerce_with<F>(mut self, coerce: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, TypeError> + Send + Sync + 'static,
    {
        self.coerce = Some(Arc::new(coerce));
        self
    }

    /// Whether a default is declared.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Resolve the declared default, if any.
    pub fn default_value(&self) -> Option<Value> {
        self.default.as_ref().map(DefaultValue::resolve)
    }

    pub fn is_relation(&self) -> bool {
        self.relation.is_some()
    }

    /// Coerce a value the way the model stores it.
    ///
    /// Relations coerce through the referenced key type. Errors name the
    /// attribute.
    pub fn coerce_value(&self, value: &Value) -> Result<Value, TypeError> {
        let result = if let Some(coerce) = &self.coerce {
            coerce(value)
        } else if let Some(rel) = &self.relation {
            rel.key_type.coerce(value)
        } else {
            self.ty.coerce(value)
        };
        result.map_err(|mut err| {
            err.attribute.get_or_insert_with(|| self.name.clone());
            err
        })
    }
}

impl fmt::Debug for AttributeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeInfo")
            .field("name", &self.name)
            .field("column_name", &self.column_name)
            .field("ty", &self.ty)
            .field("nullable", &self.nullable)
            .field("default", &self.default)
            .field("choices", &self.choices)
            .field("max_length", &self.max_length)
            .field("primary_key", &self.primary_key)
            .field("relation", &self.relation)
            .field("coerce", &self.coerce.as_ref().map(|_| ".."))
            .finish_non_exhaustive()
    }
}
