use lumendb_schema::types::EvolutionMode;
use serde::Deserialize;
use std::collections::BTreeSet;

///
/// CatalogConfig
///
/// Settings of one in-memory catalog. Every field has a default, so a
/// partial JSON document is enough.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub name: String,

    /// Evolution modes of entity schemas the session creates on the fly.
    pub default_evolution_modes: BTreeSet<EvolutionMode>,

    pub first_generated_primary_key: i32,

    /// Analyze and register a model class the first time an entity of it
    /// is created through the session.
    pub auto_register_model_classes: bool,
}

impl CatalogConfig {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse from JSON, missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn default_evolution_modes(
        mut self,
        modes: impl IntoIterator<Item = EvolutionMode>,
    ) -> Self {
        self.default_evolution_modes = modes.into_iter().collect();
        self
    }

    #[must_use]
    pub const fn first_generated_primary_key(mut self, primary_key: i32) -> Self {
        self.first_generated_primary_key = primary_key;
        self
    }

    #[must_use]
    pub const fn auto_register_model_classes(mut self, enabled: bool) -> Self {
        self.auto_register_model_classes = enabled;
        self
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            name: "catalog".to_string(),
            default_evolution_modes: EvolutionMode::all(),
            first_generated_primary_key: 1,
            auto_register_model_classes: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = CatalogConfig::from_json(
            r#"{ "name": "shop", "default_evolution_modes": ["AddingAttributes"] }"#,
        )
        .expect("valid config");

        assert_eq!(config.name, "shop");
        assert_eq!(
            config.default_evolution_modes,
            BTreeSet::from([EvolutionMode::AddingAttributes])
        );
        assert_eq!(config.first_generated_primary_key, 1);
        assert!(config.auto_register_model_classes);
    }

    #[test]
    fn setters_chain() {
        let config = CatalogConfig::new("shop")
            .first_generated_primary_key(1000)
            .auto_register_model_classes(false)
            .default_evolution_modes([]);

        assert_eq!(config.first_generated_primary_key, 1000);
        assert!(!config.auto_register_model_classes);
        assert!(config.default_evolution_modes.is_empty());
    }
}
