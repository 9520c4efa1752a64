// src/plugin/invoker.rs

//! Pluggable plugin invocation.
//!
//! Workers never spawn processes directly. They ask an [`InvokerFactory`] for
//! an [`Invoker`] bound to one plugin and invoke named commands on it, getting
//! back a [`ProcessHandle`] they own.
//!
//! - [`CommandInvokerFactory`] is the production implementation. It runs the
//!   plugin executable through the platform shell.
//! - Tests provide factories that record invocations without spawning
//!   anything.

use std::fmt::Debug;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::debug;

use crate::plugin::process::{ChildProcess, shell_command, shell_quote};
use crate::plugin::{PluginInstall, Session};
use crate::project::Project;

/// Environment variable pointing plugin processes at the project root.
pub const PROJECT_ROOT_ENV: &str = "PIPEWORKER_PROJECT_ROOT";

/// Handle on a launched process.
pub trait ProcessHandle: Send + Debug {
    fn pid(&self) -> Option<u32>;

    /// Ask the process to stop. Does not wait for it to exit.
    fn terminate(&mut self) -> Result<()>;
}

/// A plugin prepared for execution.
pub trait Invoker: Send {
    /// Launch the named command of the plugin.
    fn invoke(&self, command: &str) -> Result<Box<dyn ProcessHandle>>;
}

/// Builds invokers for configured plugins.
pub trait InvokerFactory: Send + Sync {
    fn create(
        &self,
        session: &Session,
        project: &Project,
        plugin: &PluginInstall,
    ) -> Result<Box<dyn Invoker>>;
}

/// Production factory: plugins run as shell commands.
#[derive(Debug, Clone, Default)]
pub struct CommandInvokerFactory;

impl CommandInvokerFactory {
    pub fn new() -> Self {
        Self
    }

    /// Concrete invoker, for callers that need the raw `Command`.
    pub fn invoker(
        &self,
        session: &Session,
        project: &Project,
        plugin: &PluginInstall,
    ) -> Result<CommandInvoker> {
        let working_dir = project.plugin_run_dir(plugin);
        std::fs::create_dir_all(&working_dir)
            .with_context(|| format!("creating run directory {:?}", working_dir))?;

        let mut env: Vec<(String, String)> = session
            .env()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        env.push((
            PROJECT_ROOT_ENV.to_string(),
            project.root().to_string_lossy().into_owned(),
        ));
        env.extend(plugin.settings_env());

        debug!(
            session = %session.label(),
            plugin = %plugin.name(),
            working_dir = ?working_dir,
            "prepared plugin invoker"
        );

        Ok(CommandInvoker {
            plugin: plugin.clone(),
            working_dir,
            env,
        })
    }
}

impl InvokerFactory for CommandInvokerFactory {
    fn create(
        &self,
        session: &Session,
        project: &Project,
        plugin: &PluginInstall,
    ) -> Result<Box<dyn Invoker>> {
        Ok(Box::new(self.invoker(session, project, plugin)?))
    }
}

/// Runs commands of one plugin in its run directory with its environment.
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    plugin: PluginInstall,
    working_dir: PathBuf,
    env: Vec<(String, String)>,
}

impl CommandInvoker {
    pub fn plugin(&self) -> &PluginInstall {
        &self.plugin
    }

    /// A `Command` for `command`, with working dir and env applied but stdio
    /// left to the caller.
    pub fn command(&self, command: &str) -> Command {
        self.build(self.plugin.command_line(command))
    }

    /// Like [`command`](Self::command), with `extra_args` appended to the
    /// command line.
    pub fn command_with_args(&self, command: &str, extra_args: &[&str]) -> Command {
        let mut cmdline = self.plugin.command_line(command);
        for arg in extra_args {
            cmdline.push(' ');
            cmdline.push_str(&shell_quote(arg));
        }
        self.build(cmdline)
    }

    fn build(&self, cmdline: String) -> Command {
        debug!(plugin = %self.plugin.name(), cmd = %cmdline, "building plugin command");
        let mut cmd = shell_command(&cmdline);
        cmd.current_dir(&self.working_dir)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd
    }
}

impl Invoker for CommandInvoker {
    fn invoke(&self, command: &str) -> Result<Box<dyn ProcessHandle>> {
        let cmd = self.command(command);
        let process = ChildProcess::spawn(cmd, self.plugin.name(), command)?;
        Ok(Box::new(process))
    }
}
