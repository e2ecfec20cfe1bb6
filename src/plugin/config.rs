//! Plugin assignment configuration: which named handlers each stage runs,
//! in what order, and per-stage error-policy overrides.

use crate::error::{PluginError, Result};
use crate::plugin::dispatcher::PluginDispatcher;
use crate::plugin::stage::{ErrorPolicy, Stage};
use figment::providers::{Env, Format, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Per-stage plugin assignments for one dispatcher.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginsConfig {
    pub requesting: Vec<PluginAssignment>,
    pub agent_requesting: Vec<PluginAssignment>,
    pub header_writing: Vec<PluginAssignment>,
    pub requested: Vec<PluginAssignment>,
    pub response_error: Vec<PluginAssignment>,

    /// Per-stage overrides of the default handler-error policy.
    pub error_policy: HashMap<Stage, ErrorPolicy>,
}

/// One named handler in a stage's chain. List order is dispatch order.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginAssignment {
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl PluginAssignment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }
}

impl PluginsConfig {
    /// Load from a TOML or YAML file (by extension), then apply
    /// `GATEWAY_PLUGINS_` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let figment = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Figment::new().merge(Yaml::file(path)),
            _ => Figment::new().merge(Toml::file(path)),
        };
        figment
            .merge(Env::prefixed("GATEWAY_PLUGINS_").split("__"))
            .extract()
            .map_err(|e| PluginError::Config(e.to_string()))
    }

    /// Apply policy overrides, then register every enabled assignment in
    /// list order. Names the catalog cannot resolve degrade to warnings
    /// from the chains; this never fails.
    pub fn apply(&self, dispatcher: &mut PluginDispatcher) {
        for (stage, policy) in &self.error_policy {
            dispatcher.set_error_policy(*stage, *policy);
        }
        for assignment in enabled(&self.requesting) {
            dispatcher.set_requesting(&assignment.name);
        }
        for assignment in enabled(&self.agent_requesting) {
            dispatcher.set_agent_requesting(&assignment.name);
        }
        for assignment in enabled(&self.header_writing) {
            dispatcher.set_header_writing(&assignment.name);
        }
        for assignment in enabled(&self.requested) {
            dispatcher.set_requested(&assignment.name);
        }
        for assignment in enabled(&self.response_error) {
            dispatcher.set_response_error(&assignment.name);
        }
    }
}

fn enabled(assignments: &[PluginAssignment]) -> impl Iterator<Item = &PluginAssignment> {
    assignments.iter().filter(|assignment| assignment.enabled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_with_defaults() {
        let yaml = r#"
requesting:
  - name: auth
  - name: rate-limit
    enabled: false
errorPolicy:
  headerWriting: logAndContinue
"#;
        let config: PluginsConfig = Figment::new()
            .merge(Yaml::string(yaml))
            .extract()
            .unwrap();

        assert_eq!(config.requesting.len(), 2);
        assert_eq!(config.requesting[0].name, "auth");
        assert!(config.requesting[0].enabled);
        assert!(!config.requesting[1].enabled);
        assert!(config.requested.is_empty());
        assert_eq!(
            config.error_policy.get(&Stage::HeaderWriting),
            Some(&ErrorPolicy::LogAndContinue)
        );
    }

    #[test]
    fn loads_from_a_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plugins.toml");
        std::fs::write(
            &path,
            r#"
[[requesting]]
name = "auth"

[[responseError]]
name = "error-page"
"#,
        )
        .unwrap();

        let config = PluginsConfig::load(&path).unwrap();
        assert_eq!(config.requesting[0].name, "auth");
        assert_eq!(config.response_error[0].name, "error-page");
    }

    #[test]
    fn missing_file_yields_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = PluginsConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.requesting.is_empty());
        assert!(config.error_policy.is_empty());
    }
}
