//! Standalone host: a YAML file declaring modules, wired through the plugin.
//!
//! ```yaml
//! modules:
//!   - name: authz
//!     type: authz.casbin
//!     config:
//!       model: |
//!         [request_definition]
//!         ...
//!       adapter:
//!         type: file
//!         path: policy.csv
//! ```
use crate::errors::HostError;
use crate::module::{EnforcementModule, MODULE_TYPE, PolicyModule};
use crate::plugin::AuthzPlugin;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub modules: Vec<ModuleEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleEntry {
    pub name: String,
    #[serde(rename = "type", default = "default_module_type")]
    pub type_name: String,
    #[serde(default)]
    pub config: Value,
}

fn default_module_type() -> String {
    MODULE_TYPE.to_string()
}

impl HostConfig {
    pub fn from_yaml(text: &str) -> Result<Self, HostError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, HostError> {
        let text = std::fs::read_to_string(path).map_err(|source| HostError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }
}

pub struct Host {
    plugin: AuthzPlugin,
    modules: Vec<Arc<EnforcementModule>>,
}

impl Host {
    /// Construct every declared module. Nothing is initialized yet.
    pub fn build(plugin: AuthzPlugin, config: &HostConfig) -> Result<Self, HostError> {
        let mut seen = HashSet::new();
        let mut modules = Vec::with_capacity(config.modules.len());
        for entry in &config.modules {
            if !seen.insert(entry.name.as_str()) {
                return Err(HostError::DuplicateModule(entry.name.clone()));
            }
            modules.push(plugin.create_module(&entry.type_name, &entry.name, &entry.config)?);
        }
        Ok(Self { plugin, modules })
    }

    pub fn plugin(&self) -> &AuthzPlugin {
        &self.plugin
    }

    pub fn module(&self, name: &str) -> Result<Arc<EnforcementModule>, HostError> {
        self.modules
            .iter()
            .find(|m| m.name() == name)
            .cloned()
            .ok_or_else(|| HostError::UnknownModule(name.to_string()))
    }

    /// Initialize every module in declaration order, then start reloaders.
    pub async fn start(&self) -> Result<(), HostError> {
        for module in &self.modules {
            module.initialize().await?;
        }
        for module in &self.modules {
            module.start();
        }
        Ok(())
    }

    pub async fn shutdown(&self) {
        for module in &self.modules {
            module.stop().await;
        }
    }
}
