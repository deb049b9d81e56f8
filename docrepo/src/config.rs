use serde::{Deserialize, Serialize};

/// Default name of the discriminator property written into every document.
pub const DEFAULT_DISCRIMINATOR: &str = "type";

/// Runtime settings shared by every repository built from one schema.
///
/// Read from the optional `engine:` section of schema.yaml; every key has a
/// default so the section can be omitted entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Property holding the entity type tag.
    #[serde(default = "default_discriminator")]
    pub discriminator: String,

    /// What happens to the per-query view once a predicate query has run.
    #[serde(default)]
    pub view_lifecycle: ViewLifecycle,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            discriminator: default_discriminator(),
            view_lifecycle: ViewLifecycle::default(),
        }
    }
}

fn default_discriminator() -> String {
    DEFAULT_DISCRIMINATOR.to_string()
}

/// Lifecycle of the ephemeral views created by predicate queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewLifecycle {
    /// Leave every ephemeral view registered in the store. Each `find_by`
    /// call adds one view that is never reclaimed.
    #[default]
    Retain,
    /// Delete the ephemeral view right after its single query.
    Drop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.discriminator, "type");
        assert_eq!(config.view_lifecycle, ViewLifecycle::Retain);
    }

    #[test]
    fn test_parse_partial_section() {
        let config: EngineConfig = serde_yaml::from_str("view_lifecycle: drop").unwrap();
        assert_eq!(config.view_lifecycle, ViewLifecycle::Drop);
        assert_eq!(config.discriminator, "type");
    }
}
