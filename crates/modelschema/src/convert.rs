//! Model to field conversion.
//!
//! A [`ModelConverter`] holds an ordered list of rules mapping attribute
//! types to field builders. Converting an attribute walks its type's
//! ancestors from the most specific one and, for each, scans the rules
//! newest first; the first matching rule builds the field. Attributes no rule
//! matches become [`FieldKind::Raw`] fields.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use modelschema_core::{AttributeInfo, AttributeType, DefaultValue, ModelDef, Value};

use crate::fields::{Field, FieldClass, FieldKind, FieldParams};
use crate::opts::SchemaOpts;
use crate::validate::Validator;

/// Builds a field for an attribute from the universal parameters.
///
/// Returning `None` leaves the attribute out of the schema.
pub type FieldBuilder =
    Arc<dyn Fn(&AttributeInfo, &SchemaOpts, FieldParams) -> Option<Field> + Send + Sync>;

/// Ordered attribute type to field builder rules.
///
/// Cloning copies the rule list; registrations on a clone never reach the
/// original.
#[derive(Clone)]
pub struct ModelConverter {
    rules: Vec<(AttributeType, FieldBuilder)>,
}

impl ModelConverter {
    /// A converter with the default rules.
    pub fn new() -> Self {
        let mut converter = Self::empty();
        converter
            .register(AttributeType::Integer, FieldClass::Integer)
            .register(AttributeType::BigInteger, FieldClass::Integer)
            .register(AttributeType::SmallInteger, FieldClass::Integer)
            .register(AttributeType::DateTime, FieldClass::DateTime)
            .register(AttributeType::Date, FieldClass::Date)
            .register(AttributeType::Time, FieldClass::Time)
            .register(AttributeType::Text, FieldClass::String)
            .register(AttributeType::Char, FieldClass::String)
            .register(AttributeType::FixedChar, FieldClass::String)
            .register(AttributeType::Float, FieldClass::Float)
            .register(AttributeType::Double, FieldClass::Float)
            .register(AttributeType::Decimal, FieldClass::Decimal)
            .register(AttributeType::Uuid, FieldClass::Uuid)
            .register(AttributeType::ForeignKey, FieldClass::ForeignKey)
            .register(AttributeType::DeferredForeignKey, FieldClass::ForeignKey)
            .register_with(AttributeType::Auto, convert_primary_key)
            .register_with(AttributeType::BigAuto, convert_primary_key)
            .register_with(AttributeType::Char, convert_bounded_text)
            .register_with(AttributeType::FixedChar, convert_bounded_text)
            .register_with(AttributeType::Boolean, convert_boolean);
        converter
    }

    /// A converter without rules; every attribute becomes a `Raw` field.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Map `ty` onto `class`, taking precedence over earlier rules.
    pub fn register(&mut self, ty: AttributeType, class: FieldClass) -> &mut Self {
        self.register_with(ty, move |attr: &AttributeInfo, _: &SchemaOpts, params| {
            Some(class.build(attr, params))
        })
    }

    /// Map `ty` onto a custom builder, taking precedence over earlier rules.
    pub fn register_with<F>(&mut self, ty: AttributeType, builder: F) -> &mut Self
    where
        F: Fn(&AttributeInfo, &SchemaOpts, FieldParams) -> Option<Field> + Send + Sync + 'static,
    {
        self.rules.insert(0, (ty, Arc::new(builder)));
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, ty: AttributeType, class: FieldClass) -> Self {
        self.register(ty, class);
        self
    }

    /// Builder-style [`register_with`](Self::register_with).
    pub fn with_builder<F>(mut self, ty: AttributeType, builder: F) -> Self
    where
        F: Fn(&AttributeInfo, &SchemaOpts, FieldParams) -> Option<Field> + Send + Sync + 'static,
    {
        self.register_with(ty, builder);
        self
    }

    /// The rule that applies to `ty`, if any.
    fn resolve(&self, ty: &AttributeType) -> Option<(&AttributeType, &FieldBuilder)> {
        ty.ancestors().into_iter().find_map(|ancestor| {
            self.rules
                .iter()
                .find(|(rule_ty, _)| *rule_ty == ancestor)
                .map(|(rule_ty, builder)| (rule_ty, builder))
        })
    }

    /// Convert one attribute into a field.
    pub fn convert(&self, attr: &AttributeInfo, opts: &SchemaOpts) -> Option<Field> {
        let mut params = FieldParams {
            allow_none: attr.nullable,
            attribute: Some(attr.name.clone()),
            required: !attr.nullable && !attr.has_default(),
            validators: vec![Validator::coerce(attr)],
            ..FieldParams::default()
        };
        if attr.nullable {
            params.load_default = Some(DefaultValue::Value(Value::Null));
        }
        if let Some(default) = &attr.default {
            params.load_default = Some(default.clone());
        }
        if !attr.choices.is_empty() {
            let (choices, labels) = attr.choices.iter().cloned().unzip();
            params
                .validators
                .push(Validator::OneOf { choices, labels });
        }
        if let Some(help) = &attr.help_text {
            params
                .metadata
                .insert("description".to_string(), help.clone().into());
        }

        match self.resolve(&attr.ty) {
            Some((rule_ty, builder)) => {
                tracing::trace!(
                    attribute = %attr.name,
                    ty = %attr.ty,
                    rule = %rule_ty,
                    "Resolved conversion rule"
                );
                builder(attr, opts, params)
            }
            None => {
                tracing::trace!(attribute = %attr.name, ty = %attr.ty, "No conversion rule, using Raw");
                Some(Field::with_params(FieldKind::Raw, params))
            }
        }
    }

    /// Convert every attribute of `model`, in attribute order.
    ///
    /// With `id_keys`, relation fields are named after the storage name.
    pub fn get_fields(&self, model: &ModelDef, opts: &SchemaOpts) -> IndexMap<String, Field> {
        let mut result = IndexMap::new();
        for attr in model.attributes() {
            let name = if opts.id_keys && attr.is_relation() {
                attr.column_name.clone()
            } else {
                attr.name.clone()
            };
            if let Some(field) = self.convert(attr, opts) {
                result.insert(name, field);
            }
        }
        result
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for ModelConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModelConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|(ty, _)| ty.name()))
            .finish()
    }
}

/// Primary keys are optional on load and dump-only per options.
fn convert_primary_key(
    _: &AttributeInfo,
    opts: &SchemaOpts,
    mut params: FieldParams,
) -> Option<Field> {
    params.required = false;
    params.dump_only = opts.dump_only_pk;
    let kind = if opts.string_keys {
        FieldKind::String
    } else {
        FieldKind::Integer
    };
    Some(Field::with_params(kind, params))
}

fn convert_bounded_text(
    attr: &AttributeInfo,
    _: &SchemaOpts,
    mut params: FieldParams,
) -> Option<Field> {
    if let Some(max) = attr.max_length {
        params.validators.push(Validator::max_length(max));
    }
    Some(Field::with_params(FieldKind::String, params))
}

fn convert_boolean(_: &AttributeInfo, _: &SchemaOpts, params: FieldParams) -> Option<Field> {
    Some(Field::with_params(FieldKind::Boolean, params))
}
