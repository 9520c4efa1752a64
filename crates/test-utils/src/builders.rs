#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use pipeworker::config::{PluginConfig, ProjectConfig, RawProjectConfig};
use pipeworker::project::Project;
use pipeworker::types::PluginType;
use pipeworker::workers::SchedulePayload;

/// Builder for `ProjectConfig` to simplify test setup.
///
/// Goes through the same validation as a config file on disk.
pub struct ProjectConfigBuilder {
    config: RawProjectConfig,
}

impl ProjectConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawProjectConfig::default(),
        }
    }

    pub fn model_dir(mut self, dir: &str) -> Self {
        self.config.project.model_dir = dir.to_string();
        self
    }

    pub fn watch_ignore(mut self, pattern: &str) -> Self {
        self.config.project.watch_ignore.push(pattern.to_string());
        self
    }

    pub fn compiler_cmd(mut self, cmd: &str) -> Self {
        self.config.compiler.cmd = Some(cmd.to_string());
        self
    }

    pub fn orchestrator(mut self, name: &str) -> Self {
        self.config.workers.orchestrator = name.to_string();
        self
    }

    pub fn process_timeout(mut self, duration: &str) -> Self {
        self.config.workers.process_timeout = Some(duration.to_string());
        self
    }

    pub fn poll_interval(mut self, duration: &str) -> Self {
        self.config.workers.poll_interval = duration.to_string();
        self
    }

    pub fn plugin(mut self, plugin_type: PluginType, name: &str, plugin: PluginConfig) -> Self {
        let plugins = &mut self.config.plugins;
        let table = match plugin_type {
            PluginType::Extractors => &mut plugins.extractors,
            PluginType::Loaders => &mut plugins.loaders,
            PluginType::Transformers => &mut plugins.transformers,
            PluginType::Orchestrators => &mut plugins.orchestrators,
        };
        table.insert(name.to_string(), plugin);
        self
    }

    pub fn build(self) -> ProjectConfig {
        ProjectConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ProjectConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `PluginConfig`.
pub struct PluginConfigBuilder {
    plugin: PluginConfig,
}

impl PluginConfigBuilder {
    pub fn new() -> Self {
        Self {
            plugin: PluginConfig {
                executable: None,
                commands: Default::default(),
                settings: Default::default(),
            },
        }
    }

    pub fn executable(mut self, executable: &str) -> Self {
        self.plugin.executable = Some(executable.to_string());
        self
    }

    pub fn command(mut self, name: &str, args: &str) -> Self {
        self.plugin.commands.insert(name.to_string(), args.to_string());
        self
    }

    pub fn setting(mut self, key: &str, value: &str) -> Self {
        self.plugin.settings.insert(key.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> PluginConfig {
        self.plugin
    }
}

impl Default for PluginConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared project rooted at `root`.
pub fn project_in(root: &Path, config: ProjectConfig) -> Arc<Project> {
    Arc::new(Project::new(root, config))
}

/// Schedule payload shorthand.
pub fn payload(
    extractor: &str,
    loader: &str,
    transform: Option<&str>,
    name: Option<&str>,
) -> SchedulePayload {
    let mut payload = SchedulePayload::new(extractor, loader);
    if let Some(mode) = transform {
        payload = payload.with_transform(mode);
    }
    if let Some(name) = name {
        payload = payload.with_name(name);
    }
    payload
}
