//! Dynamic model instances.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::Result;
use crate::error::{Error, TypeError};
use crate::model::ModelDef;
use crate::value::Value;

static NULL: Value = Value::Null;

/// An instance of a model.
///
/// Raw data is keyed by attribute name. Foreign key attributes hold the raw
/// key of the referenced record; the referenced record itself, when known,
/// lives in the relation cache. Records loaded through a reverse relation are
/// kept in the backref cache.
#[derive(Debug, Clone)]
pub struct Record {
    model: Arc<ModelDef>,
    data: IndexMap<String, Value>,
    related: HashMap<String, Record>,
    backrefs: HashMap<String, Vec<Record>>,
}

impl Record {
    /// Create a record with every attribute set to its default, or null.
    pub fn new(model: Arc<ModelDef>) -> Self {
        let data = model
            .attributes()
            .iter()
            .map(|attr| (attr.name.clone(), attr.default_value().unwrap_or(Value::Null)))
            .collect();
        Self {
            model,
            data,
            related: HashMap::new(),
            backrefs: HashMap::new(),
        }
    }

    /// Builder-style [`set`](Self::set). Unknown attributes are ignored.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        if let Err(err) = self.set(name, value) {
            tracing::warn!(error = %err, "Ignoring value for unknown attribute");
        }
        self
    }

    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Raw attribute data in attribute order.
    pub fn data(&self) -> &IndexMap<String, Value> {
        &self.data
    }

    /// Iterate over `(attribute, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Get a value, treating absent attributes as null.
    pub fn value(&self, name: &str) -> &Value {
        self.data.get(name).unwrap_or(&NULL)
    }

    /// Get a typed value by attribute name.
    #[allow(clippy::result_large_err)]
    pub fn get_as<T>(&self, name: &str) -> Result<T>
    where
        T: TryFrom<Value, Error = Error>,
    {
        let value = self.data.get(name).ok_or_else(|| {
            Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: format!("attribute '{}' not found", name),
                attribute: Some(name.to_string()),
            })
        })?;
        T::try_from(value.clone()).map_err(|e| match e {
            Error::Type(mut te) => {
                te.attribute = Some(name.to_string());
                Error::Type(te)
            }
            e => e,
        })
    }

    /// Set the raw value of an attribute.
    ///
    /// Changing a foreign key drops the cached related record.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if !self.model.has_attribute(name) {
            return Err(Error::Custom(format!(
                "model '{}' has no attribute '{}'",
                self.model.name(),
                name
            )));
        }
        let value = value.into();
        if self.related.get(name).is_some_and(|r| *r.pk() != value) {
            self.related.remove(name);
        }
        self.data.insert(name.to_string(), value);
        Ok(())
    }

    /// The primary key value.
    pub fn pk(&self) -> &Value {
        self.value(&self.model.primary_key().name)
    }

    /// Attach the related record of a foreign key, storing its key as the
    /// raw value.
    pub fn set_related(&mut self, name: &str, record: Record) -> Result<()> {
        let is_relation = self
            .model
            .attribute(name)
            .is_some_and(|attr| attr.is_relation());
        if !is_relation {
            return Err(Error::Custom(format!(
                "'{}' is not a relation of model '{}'",
                name,
                self.model.name()
            )));
        }
        self.data.insert(name.to_string(), record.pk().clone());
        self.related.insert(name.to_string(), record);
        Ok(())
    }

    /// The cached related record of a foreign key.
    pub fn related(&self, name: &str) -> Option<&Record> {
        self.related.get(name)
    }

    /// Cache the records of a reverse relation.
    pub fn set_backrefs(&mut self, name: &str, records: Vec<Record>) {
        self.backrefs.insert(name.to_string(), records);
    }

    /// The cached records of a reverse relation.
    pub fn backrefs(&self, name: &str) -> Option<&[Record]> {
        self.backrefs.get(name).map(Vec::as_slice)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.model.name() == other.model.name() && self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeInfo;
    use crate::types::AttributeType;

    fn role() -> Arc<ModelDef> {
        ModelDef::builder("Role")
            .attribute(AttributeInfo::char("name", 255).default("user"))
            .build()
    }

    fn user() -> Arc<ModelDef> {
        ModelDef::builder("User")
            .attribute(AttributeInfo::char("name", 255))
            .attribute(AttributeInfo::new("active", AttributeType::Boolean).default(true))
            .attribute(AttributeInfo::foreign_key("role", "Role"))
            .build()
    }

    #[test]
    fn new_record_uses_defaults() {
        let r = Record::new(role());
        assert_eq!(r.pk(), &Value::Null);
        assert_eq!(r.value("name"), &Value::from("user"));
        assert_eq!(r.value("missing"), &Value::Null);
    }

    #[test]
    fn set_rejects_unknown_attribute() {
        let mut r = Record::new(role());
        let err = r.set("nope", 1).unwrap_err();
        assert_eq!(err.to_string(), "model 'Role' has no attribute 'nope'");
        assert!(r.get("nope").is_none());
    }

    #[test]
    fn set_related_stores_key_and_cache() {
        let admin = Record::new(role()).with("id", 3).with("name", "admin");
        let mut u = Record::new(user()).with("id", 1).with("name", "Mike");
        u.set_related("role", admin.clone()).unwrap();
        assert_eq!(u.value("role"), &Value::BigInt(3));
        assert_eq!(u.related("role"), Some(&admin));

        u.set("role", 4).unwrap();
        assert!(u.related("role").is_none());
        assert!(u.set_related("name", admin).is_err());
    }

    #[test]
    fn typed_access() {
        let u = Record::new(user()).with("name", "Mike");
        let name: String = u.get_as("name").unwrap();
        assert_eq!(name, "Mike");
        let active: bool = u.get_as("active").unwrap();
        assert!(active);
        let role: Option<i64> = u.get_as("role").unwrap();
        assert_eq!(role, None);

        let err = u.get_as::<i64>("name").unwrap_err();
        match err {
            Error::Type(te) => assert_eq!(te.attribute.as_deref(), Some("name")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn equality_ignores_caches() {
        let a = Record::new(role()).with("id", 1);
        let mut b = a.clone();
        b.set_backrefs("user_set", vec![]);
        assert_eq!(a, b);
        assert_ne!(a, a.clone().with("name", "admin"));
    }
}
