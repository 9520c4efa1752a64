// src/config/service.rs

//! Read-only plugin lookup over a loaded [`ProjectConfig`].

use std::sync::Arc;

use crate::config::model::{PluginConfig, ProjectConfig};
use crate::errors::WorkerError;
use crate::plugin::PluginInstall;
use crate::types::PluginType;

/// Resolves configured plugins by name.
///
/// Cheap to clone; the configuration is shared and never mutated, so lookups
/// are safe from any number of workers at once.
#[derive(Debug, Clone)]
pub struct ConfigService {
    config: Arc<ProjectConfig>,
}

impl ConfigService {
    pub fn new(config: Arc<ProjectConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Find a plugin by name, whatever its type.
    pub fn find_plugin(&self, name: &str) -> Result<PluginInstall, WorkerError> {
        PluginType::ALL
            .iter()
            .find_map(|plugin_type| self.lookup(*plugin_type, name))
            .ok_or_else(|| WorkerError::PluginNotFound {
                name: name.to_string(),
                plugin_type: None,
            })
    }

    /// Find a plugin by name among plugins of the given type.
    pub fn find_plugin_of_type(
        &self,
        plugin_type: PluginType,
        name: &str,
    ) -> Result<PluginInstall, WorkerError> {
        self.lookup(plugin_type, name)
            .ok_or_else(|| WorkerError::PluginNotFound {
                name: name.to_string(),
                plugin_type: Some(plugin_type),
            })
    }

    /// All configured plugins of one type, in name order.
    pub fn plugins_of_type(&self, plugin_type: PluginType) -> Vec<PluginInstall> {
        self.table(plugin_type)
            .iter()
            .map(|(name, cfg)| PluginInstall::from_config(plugin_type, name, cfg))
            .collect()
    }

    fn lookup(&self, plugin_type: PluginType, name: &str) -> Option<PluginInstall> {
        self.table(plugin_type)
            .get(name)
            .map(|cfg| PluginInstall::from_config(plugin_type, name, cfg))
    }

    fn table(&self, plugin_type: PluginType) -> &std::collections::BTreeMap<String, PluginConfig> {
        let plugins = self.config.plugins();
        match plugin_type {
            PluginType::Extractors => &plugins.extractors,
            PluginType::Loaders => &plugins.loaders,
            PluginType::Transformers => &plugins.transformers,
            PluginType::Orchestrators => &plugins.orchestrators,
        }
    }
}
