//! Model registry and relationship lookup.
//!
//! Relations are declared on the owning side only, as foreign key
//! attributes. The registry resolves both directions: forward relations by
//! the attribute's target model name and reverse relations by backref name.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::Result;
use crate::attribute::AttributeInfo;
use crate::error::Error;
use crate::model::ModelDef;

/// The type of a relation as seen from one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    /// Many-to-one: this model holds the foreign key.
    ManyToOne,
    /// One-to-many: another model holds a foreign key pointing here.
    OneToMany,
}

/// A one-to-many relation reached through a backref name.
#[derive(Debug, Clone)]
pub struct ReverseRelation {
    /// Backref name on the referenced model
    pub name: String,
    /// Model holding the foreign key
    pub owner: Arc<ModelDef>,
    /// Foreign key attribute on `owner`
    pub attribute: String,
}

impl ReverseRelation {
    /// The foreign key attribute on the owning model.
    pub fn foreign_key(&self) -> Option<&AttributeInfo> {
        self.owner.attribute(&self.attribute)
    }
}

/// Models known to a configuration, by name.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: IndexMap<String, Arc<ModelDef>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model. A model with the same name is replaced.
    pub fn register(&mut self, model: Arc<ModelDef>) -> &mut Self {
        tracing::trace!(model = model.name(), "Registering model");
        self.models.insert(model.name().to_string(), model);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, model: Arc<ModelDef>) -> Self {
        self.register(model);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<ModelDef>> {
        self.models.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Registered models in registration order.
    pub fn models(&self) -> impl Iterator<Item = &Arc<ModelDef>> {
        self.models.values()
    }

    /// Classify `name` on `model`: a forward foreign key, a reverse relation,
    /// or neither.
    pub fn relationship_kind(&self, model: &ModelDef, name: &str) -> Option<RelationshipKind> {
        if model.attribute(name).is_some_and(AttributeInfo::is_relation) {
            Some(RelationshipKind::ManyToOne)
        } else if self.reverse_relation(model.name(), name).is_some() {
            Some(RelationshipKind::OneToMany)
        } else {
            None
        }
    }

    /// Target model of the forward relation `attribute` on `model`.
    pub fn related_model(&self, model: &ModelDef, attribute: &str) -> Option<Arc<ModelDef>> {
        let rel = model.attribute(attribute)?.relation.as_ref()?;
        self.get(&rel.model)
    }

    /// Find the reverse relation called `name` on the model `target`.
    pub fn reverse_relation(&self, target: &str, name: &str) -> Option<ReverseRelation> {
        self.reverse_relations(target)
            .into_iter()
            .find(|rev| rev.name == name)
    }

    /// All reverse relations pointing at `target`.
    pub fn reverse_relations(&self, target: &str) -> Vec<ReverseRelation> {
        let mut found = Vec::new();
        for owner in self.models.values() {
            for attr in owner.relations() {
                let Some(rel) = &attr.relation else { continue };
                if rel.model == target {
                    found.push(ReverseRelation {
                        name: rel.backref_name(owner.name()),
                        owner: Arc::clone(owner),
                        attribute: attr.name.clone(),
                    });
                }
            }
        }
        found
    }

    /// Check that every foreign key references a registered model.
    ///
    /// Deferred foreign keys may be declared before their target; this is
    /// where a target that never arrived is reported.
    pub fn validate(&self) -> Result<()> {
        for model in self.models.values() {
            for attr in model.relations() {
                let Some(rel) = &attr.relation else { continue };
                if !self.contains(&rel.model) {
                    return Err(Error::config(format!(
                        "{}.{} references unknown model '{}'",
                        model.name(),
                        attr.name,
                        rel.model
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeType;

    fn registry() -> ModelRegistry {
        let role = ModelDef::builder("Role")
            .attribute(AttributeInfo::char("name", 255))
            .build();
        let user = ModelDef::builder("User")
            .attribute(AttributeInfo::char("name", 255))
            .attribute(AttributeInfo::foreign_key("role", "Role"))
            .build();
        ModelRegistry::new().with(role).with(user)
    }

    #[test]
    fn forward_and_reverse_lookup() {
        let reg = registry();
        let user = reg.get("User").unwrap();
        let role = reg.get("Role").unwrap();

        assert_eq!(reg.related_model(&user, "role").unwrap().name(), "Role");
        assert_eq!(
            reg.relationship_kind(&user, "role"),
            Some(RelationshipKind::ManyToOne)
        );
        assert_eq!(
            reg.relationship_kind(&role, "user_set"),
            Some(RelationshipKind::OneToMany)
        );
        assert_eq!(reg.relationship_kind(&user, "name"), None);

        let rev = reg.reverse_relation("Role", "user_set").unwrap();
        assert_eq!(rev.owner.name(), "User");
        assert_eq!(rev.foreign_key().unwrap().column_name, "role_id");
    }

    #[test]
    fn self_reference_with_backref() {
        let node = ModelDef::builder("Node")
            .attribute(
                AttributeInfo::deferred_foreign_key("parent", "Node")
                    .nullable(true)
                    .backref("children"),
            )
            .build();
        let reg = ModelRegistry::new().with(node);
        let rev = reg.reverse_relation("Node", "children").unwrap();
        assert_eq!(rev.attribute, "parent");
        assert!(reg.validate().is_ok());
    }

    #[test]
    fn validate_reports_missing_target() {
        let user = ModelDef::builder("User")
            .attribute(
                AttributeInfo::deferred_foreign_key("team", "Team").key_type(AttributeType::Uuid),
            )
            .build();
        let err = ModelRegistry::new().with(user).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: User.team references unknown model 'Team'"
        );
    }
}
