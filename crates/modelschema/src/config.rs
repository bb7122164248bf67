//! Configuration context.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use modelschema_core::{ModelDef, ModelRegistry, RecordSource, Result};

use crate::convert::ModelConverter;

/// Option defaults for schemas that do not set them in their `Meta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Primary keys are dump-only
    pub dump_only_pk: bool,
    /// Primary and foreign keys are rendered as strings
    pub string_keys: bool,
    /// Foreign keys use their storage name (`role_id`) as field name
    pub id_keys: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            dump_only_pk: true,
            string_keys: true,
            id_keys: false,
        }
    }
}

impl Defaults {
    /// Parse defaults from JSON; missing options keep their default.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Everything a schema needs from its environment when it is built.
///
/// Cloning is cheap. Schemas copy what they need at build time, so later
/// changes to a `Config` only affect schemas built afterwards.
#[derive(Clone, Default)]
pub struct Config {
    defaults: Defaults,
    registry: Arc<ModelRegistry>,
    converter: ModelConverter,
    source: Option<Arc<dyn RecordSource>>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Add a model to the registry.
    pub fn register_model(&mut self, model: Arc<ModelDef>) -> &mut Self {
        Arc::make_mut(&mut self.registry).register(model);
        self
    }

    /// Record source used to resolve relations that are not cached.
    pub fn with_source(mut self, source: Arc<dyn RecordSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the default converter.
    pub fn with_converter(mut self, converter: ModelConverter) -> Self {
        self.converter = converter;
        self
    }

    /// Change the option defaults.
    ///
    /// ```ignore
    /// config.setup(|d| d.string_keys = false);
    /// ```
    pub fn setup(&mut self, f: impl FnOnce(&mut Defaults)) -> &mut Self {
        f(&mut self.defaults);
        tracing::debug!(defaults = ?self.defaults, "Updated schema defaults");
        self
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn converter(&self) -> &ModelConverter {
        &self.converter
    }

    pub fn source(&self) -> Option<&Arc<dyn RecordSource>> {
        self.source.as_ref()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("defaults", &self.defaults)
            .field("models", &self.registry.len())
            .field("converter", &self.converter)
            .field("source", &self.source.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelschema_core::AttributeInfo;

    #[test]
    fn setup_changes_defaults() {
        let mut config = Config::new();
        assert_eq!(config.defaults(), &Defaults::default());
        config.setup(|d| {
            d.string_keys = false;
            d.id_keys = true;
        });
        assert!(!config.defaults().string_keys);
        assert!(config.defaults().id_keys);
        assert!(config.defaults().dump_only_pk);
    }

    #[test]
    fn clones_do_not_share_registrations() {
        let mut config = Config::new();
        let snapshot = config.clone();
        config.register_model(ModelDef::builder("Role").build());
        assert!(config.registry().contains("Role"));
        assert!(!snapshot.registry().contains("Role"));
    }

    #[test]
    fn defaults_from_json() {
        let defaults = Defaults::from_json(r#"{"string_keys": false}"#).unwrap();
        assert!(!defaults.string_keys);
        assert!(defaults.dump_only_pk);
        assert!(Defaults::from_json("[").is_err());
    }

    #[test]
    fn registry_builder() {
        let role = ModelDef::builder("Role")
            .attribute(AttributeInfo::char("name", 255))
            .build();
        let config = Config::new().with_registry(ModelRegistry::new().with(role));
        assert_eq!(config.registry().len(), 1);
        assert!(config.source().is_none());
    }
}
