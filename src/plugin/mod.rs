// src/plugin/mod.rs

//! Configured external tools and how to launch them.
//!
//! - [`PluginInstall`] describes one configured plugin.
//! - [`Session`] is the explicit invocation context handed to invoker
//!   factories.
//! - [`invoker`] holds the `InvokerFactory` / `Invoker` / `ProcessHandle`
//!   seams plus the command-based implementation used in production.
//! - [`process`] spawns and tears down the underlying OS processes.

pub mod invoker;
pub mod process;

use std::collections::BTreeMap;

use crate::config::PluginConfig;
use crate::types::PluginType;

pub use invoker::{CommandInvoker, CommandInvokerFactory, Invoker, InvokerFactory, ProcessHandle};
pub use process::ChildProcess;

/// A configured external tool: type, name, how to run it and its settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInstall {
    plugin_type: PluginType,
    name: String,
    executable: String,
    commands: BTreeMap<String, String>,
    settings: BTreeMap<String, String>,
}

impl PluginInstall {
    pub fn new(plugin_type: PluginType, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            plugin_type,
            executable: name.clone(),
            name,
            commands: BTreeMap::new(),
            settings: BTreeMap::new(),
        }
    }

    pub fn from_config(plugin_type: PluginType, name: &str, cfg: &PluginConfig) -> Self {
        Self {
            plugin_type,
            name: name.to_string(),
            executable: cfg.executable.clone().unwrap_or_else(|| name.to_string()),
            commands: cfg.commands.clone(),
            settings: cfg.settings.clone(),
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_command(mut self, name: impl Into<String>, args: impl Into<String>) -> Self {
        self.commands.insert(name.into(), args.into());
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn plugin_type(&self) -> PluginType {
        self.plugin_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    pub fn has_command(&self, command: &str) -> bool {
        self.commands.contains_key(command)
    }

    pub fn settings(&self) -> &BTreeMap<String, String> {
        &self.settings
    }

    /// Full command line for a named command.
    ///
    /// Configured commands map to their argument string; anything else is
    /// passed to the executable verbatim.
    pub fn command_line(&self, command: &str) -> String {
        let args = self
            .commands
            .get(command)
            .map(String::as_str)
            .unwrap_or(command);
        if args.trim().is_empty() {
            self.executable.clone()
        } else {
            format!("{} {}", self.executable, args)
        }
    }

    /// Settings as environment variables: `tap-gitlab` + `start_date`
    /// becomes `TAP_GITLAB_START_DATE`.
    pub fn settings_env(&self) -> Vec<(String, String)> {
        let prefix = env_key(&self.name);
        self.settings
            .iter()
            .map(|(key, value)| (format!("{prefix}_{}", env_key(key)), value.clone()))
            .collect()
    }
}

fn env_key(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Invocation context passed explicitly to every invoker factory.
///
/// Carries the environment shared by all processes launched on behalf of
/// one caller, and a label used in logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    label: String,
    env: BTreeMap<String, String>,
}

impl Session {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new("default")
    }
}
