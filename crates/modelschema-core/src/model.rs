//! Model definitions and the typed model bridge.
//!
//! A [`ModelDef`] describes a record type at runtime: its name and ordered
//! attributes. Typed structs opt into the schema layer through the [`Model`]
//! trait, which converts them to and from dynamic [`Record`]s.

use std::collections::HashMap;
use std::sync::Arc;

use crate::Result;
use crate::attribute::AttributeInfo;
use crate::record::Record;

/// Runtime description of a model.
#[derive(Debug, Clone)]
pub struct ModelDef {
    name: String,
    attributes: Vec<AttributeInfo>,
    /// Attribute name -> index
    index: HashMap<String, usize>,
    primary_key: usize,
}

impl ModelDef {
    /// Start defining a model called `name`.
    pub fn builder(name: impl Into<String>) -> ModelDefBuilder {
        ModelDefBuilder {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes in storage order.
    pub fn attributes(&self) -> &[AttributeInfo] {
        &self.attributes
    }

    /// Look up an attribute by its logical name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.index.get(name).map(|&i| &self.attributes[i])
    }

    /// Look up an attribute by its storage name.
    pub fn attribute_by_column(&self, column: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.column_name == column)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The primary key attribute. Every model has exactly one.
    pub fn primary_key(&self) -> &AttributeInfo {
        &self.attributes[self.primary_key]
    }

    /// Attributes referencing other models.
    pub fn relations(&self) -> impl Iterator<Item = &AttributeInfo> {
        self.attributes.iter().filter(|a| a.is_relation())
    }
}

/// Builder for [`ModelDef`].
#[derive(Debug, Clone)]
pub struct ModelDefBuilder {
    name: String,
    attributes: Vec<AttributeInfo>,
}

impl ModelDefBuilder {
    /// Add an attribute. Redeclaring a name replaces the earlier attribute in
    /// place.
    pub fn attribute(mut self, attr: AttributeInfo) -> Self {
        if let Some(existing) = self.attributes.iter_mut().find(|a| a.name == attr.name) {
            *existing = attr;
        } else {
            self.attributes.push(attr);
        }
        self
    }

    /// Finish the definition.
    ///
    /// A model without a declared primary key gets an auto-incrementing `id`
    /// as its first attribute.
    pub fn build(mut self) -> Arc<ModelDef> {
        let primary_key = match self.attributes.iter().position(|a| a.primary_key) {
            Some(pos) => pos,
            None => {
                self.attributes.insert(0, AttributeInfo::auto("id"));
                0
            }
        };
        let index = self
            .attributes
            .iter()
            .enumerate()
            .map(|(i, a)| (a.name.clone(), i))
            .collect();
        Arc::new(ModelDef {
            name: self.name,
            attributes: self.attributes,
            index,
            primary_key,
        })
    }
}

/// Typed structs that map onto a [`ModelDef`].
///
/// # Example
///
/// ```ignore
/// impl Model for Role {
///     fn definition() -> Arc<ModelDef> {
///         ModelDef::builder("Role")
///             .attribute(AttributeInfo::char("name", 255).default("user"))
///             .build()
///     }
///
///     fn to_record(&self) -> Record {
///         Record::new(Self::definition())
///             .with("id", self.id)
///             .with("name", self.name.as_str())
///     }
///
///     fn from_record(record: &Record) -> Result<Self> {
///         Ok(Role {
///             id: record.get_as("id")?,
///             name: record.get_as("name")?,
///         })
///     }
/// }
/// ```
pub trait Model: Sized {
    /// The runtime definition of this model.
    fn definition() -> Arc<ModelDef>;

    /// Convert this value into a dynamic record.
    fn to_record(&self) -> Record;

    /// Build a value from a dynamic record.
    fn from_record(record: &Record) -> Result<Self>;
}
