// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Configuration as read from `pipeworker.toml`, before validation.
///
/// ```toml
/// [project]
/// model_dir = "model"
///
/// [compiler]
/// cmd = "compile-models"
///
/// [workers]
/// orchestrator = "airflow"
/// poll_interval = "2s"
///
/// [plugins.extractors.tap-gitlab]
/// executable = "tap-gitlab"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawProjectConfig {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub compiler: CompilerSection,

    #[serde(default)]
    pub workers: RawWorkersSection,

    #[serde(default)]
    pub plugins: PluginsSection,
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    /// Directory (relative to the project root) holding the model sources.
    #[serde(default = "default_model_dir")]
    pub model_dir: String,

    /// Glob patterns that never trigger recompilation.
    ///
    /// Compiled artifacts (`*.m5oc`) are always ignored in addition to these.
    #[serde(default)]
    pub watch_ignore: Vec<String>,
}

fn default_model_dir() -> String {
    "model".to_string()
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            watch_ignore: Vec::new(),
        }
    }
}

/// `[compiler]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CompilerSection {
    /// Shell command that compiles the models. Run from the project root.
    #[serde(default)]
    pub cmd: Option<String>,
}

/// `[workers]` section, durations still as strings.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkersSection {
    #[serde(default = "default_orchestrator")]
    pub orchestrator: String,

    #[serde(default = "default_ui_url")]
    pub ui_url: String,

    #[serde(default)]
    pub open_browser: bool,

    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    #[serde(default)]
    pub poll_max_attempts: Option<u32>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,

    /// Upper bound for a single ELT stage. Unbounded when unset.
    #[serde(default)]
    pub process_timeout: Option<String>,
}

fn default_orchestrator() -> String {
    "airflow".to_string()
}

fn default_ui_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_poll_interval() -> String {
    "2s".to_string()
}

fn default_request_timeout() -> String {
    "5s".to_string()
}

impl Default for RawWorkersSection {
    fn default() -> Self {
        Self {
            orchestrator: default_orchestrator(),
            ui_url: default_ui_url(),
            open_browser: false,
            poll_interval: default_poll_interval(),
            poll_max_attempts: None,
            request_timeout: default_request_timeout(),
            process_timeout: None,
        }
    }
}

/// `[plugins.<type>.<name>]` tables.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PluginsSection {
    #[serde(default)]
    pub extractors: BTreeMap<String, PluginConfig>,

    #[serde(default)]
    pub loaders: BTreeMap<String, PluginConfig>,

    #[serde(default)]
    pub transformers: BTreeMap<String, PluginConfig>,

    #[serde(default)]
    pub orchestrators: BTreeMap<String, PluginConfig>,
}

/// A single configured plugin.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PluginConfig {
    /// Program to run. Defaults to the plugin name.
    #[serde(default)]
    pub executable: Option<String>,

    /// Named sub-commands, e.g. `webserver = "webserver -p 8080"`.
    ///
    /// A command that is not listed here is passed through verbatim.
    #[serde(default)]
    pub commands: BTreeMap<String, String>,

    /// Settings exported to the plugin process as environment variables.
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

/// `[workers]` after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkersSection {
    pub orchestrator: String,
    pub ui_url: String,
    pub open_browser: bool,
    pub poll_interval: Duration,
    pub poll_max_attempts: Option<u32>,
    pub request_timeout: Duration,
    pub process_timeout: Option<Duration>,
}

impl Default for WorkersSection {
    fn default() -> Self {
        Self {
            orchestrator: default_orchestrator(),
            ui_url: default_ui_url(),
            open_browser: false,
            poll_interval: Duration::from_secs(2),
            poll_max_attempts: None,
            request_timeout: Duration::from_secs(5),
            process_timeout: None,
        }
    }
}

/// Validated project configuration.
///
/// Only obtainable through `TryFrom<RawProjectConfig>` (or `Default`), so
/// holders can rely on durations being parsed and plugin names being unique.
#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    project: ProjectSection,
    compiler: CompilerSection,
    workers: WorkersSection,
    plugins: PluginsSection,
}

impl ProjectConfig {
    pub(crate) fn new_unchecked(
        project: ProjectSection,
        compiler: CompilerSection,
        workers: WorkersSection,
        plugins: PluginsSection,
    ) -> Self {
        Self {
            project,
            compiler,
            workers,
            plugins,
        }
    }

    pub fn project(&self) -> &ProjectSection {
        &self.project
    }

    pub fn compiler(&self) -> &CompilerSection {
        &self.compiler
    }

    pub fn workers(&self) -> &WorkersSection {
        &self.workers
    }

    pub fn plugins(&self) -> &PluginsSection {
        &self.plugins
    }
}
