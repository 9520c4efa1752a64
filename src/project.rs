// src/project.rs

//! The project every worker operates on.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::{ConfigService, ProjectConfig, load_project_config};
use crate::errors::Result;
use crate::plugin::PluginInstall;
use crate::types::PluginType;

/// Name of the directory holding generated state (run dirs, plugin config).
pub const SYSTEM_DIR_NAME: &str = ".pipeworker";

/// A project root plus the paths derived from it.
///
/// Workers receive a shared `Arc<Project>` and only ever read from it.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    config: Arc<ProjectConfig>,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>, config: ProjectConfig) -> Self {
        Self {
            root: root.into(),
            config: Arc::new(config),
        }
    }

    /// Open the project rooted at `root`, loading its `pipeworker.toml`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let root = root.canonicalize().unwrap_or_else(|_| root.clone());
        let config = load_project_config(&root)?;
        debug!(root = ?root, "opened project");
        Ok(Self::new(root, config))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn config_service(&self) -> ConfigService {
        ConfigService::new(Arc::clone(&self.config))
    }

    /// `<root>/<sub>`.
    pub fn root_dir(&self, sub: impl AsRef<Path>) -> PathBuf {
        self.root.join(sub)
    }

    /// Directory holding the model sources watched for recompilation.
    pub fn model_dir(&self) -> PathBuf {
        self.root_dir(&self.config.project().model_dir)
    }

    /// `<root>/.pipeworker/<parts...>`.
    pub fn system_dir<I, P>(&self, parts: I) -> PathBuf
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut path = self.root.join(SYSTEM_DIR_NAME);
        for part in parts {
            path.push(part);
        }
        path
    }

    /// Default scratch directory for ELT runs.
    pub fn run_dir(&self) -> PathBuf {
        self.system_dir(["run"])
    }

    /// Per-plugin working directory for long-running processes.
    pub fn plugin_run_dir(&self, plugin: &PluginInstall) -> PathBuf {
        self.system_dir(["run", plugin.name()])
    }

    /// Per-plugin configuration directory, e.g. `.pipeworker/loaders/target-csv`.
    pub fn plugin_dir(&self, plugin_type: PluginType, name: &str) -> PathBuf {
        self.system_dir([plugin_type.as_str(), name])
    }
}
