// src/workers/orchestrator.rs

//! Supervision of the orchestrator's webserver + scheduler pair.

use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::WorkerError;
use crate::plugin::{InvokerFactory, PluginInstall, ProcessHandle, Session};
use crate::project::Project;
use crate::types::PluginType;

pub const WEBSERVER_COMMAND: &str = "webserver";
pub const SCHEDULER_COMMAND: &str = "scheduler";

/// Launches and tears down the orchestrator's two long-running processes.
///
/// The processes run detached from the call that started them and live
/// until [`stop`](Self::stop) terminates them.
#[derive(Debug)]
pub struct OrchestratorWorker {
    project: Arc<Project>,
    plugin: PluginInstall,
    webserver: Option<Box<dyn ProcessHandle>>,
    scheduler: Option<Box<dyn ProcessHandle>>,
    stopped: bool,
}

impl OrchestratorWorker {
    /// Use `plugin`, or look up the orchestrator named in `[workers]`.
    pub fn new(project: Arc<Project>, plugin: Option<PluginInstall>) -> Result<Self, WorkerError> {
        let plugin = match plugin {
            Some(p) => p,
            None => {
                let name = project.config().workers().orchestrator.clone();
                project
                    .config_service()
                    .find_plugin_of_type(PluginType::Orchestrators, &name)?
            }
        };

        Ok(Self {
            project,
            plugin,
            webserver: None,
            scheduler: None,
            stopped: false,
        })
    }

    pub fn plugin(&self) -> &PluginInstall {
        &self.plugin
    }

    /// True once both processes have been launched.
    pub fn is_started(&self) -> bool {
        self.webserver.is_some() && self.scheduler.is_some()
    }

    /// Launch the webserver, then the scheduler.
    ///
    /// Launch failures are returned as-is. A webserver launched before the
    /// scheduler failed stays owned by this worker, so `stop` still reaches it.
    pub fn start_all(
        &mut self,
        session: &Session,
        factory: &dyn InvokerFactory,
    ) -> Result<(), WorkerError> {
        if self.is_started() && !self.stopped {
            return Ok(());
        }
        self.stopped = false;

        let invoker = factory
            .create(session, &self.project, &self.plugin)
            .map_err(|source| self.launch_failed("<prepare>", source))?;

        let webserver = invoker
            .invoke(WEBSERVER_COMMAND)
            .map_err(|source| self.launch_failed(WEBSERVER_COMMAND, source))?;
        self.webserver = Some(webserver);

        let scheduler = invoker
            .invoke(SCHEDULER_COMMAND)
            .map_err(|source| self.launch_failed(SCHEDULER_COMMAND, source))?;
        self.scheduler = Some(scheduler);

        info!(
            plugin = %self.plugin.name(),
            session = %session.label(),
            "orchestrator webserver and scheduler started"
        );
        Ok(())
    }

    /// Background entry point; same as [`start_all`](Self::start_all).
    pub fn run(&mut self, session: &Session, factory: &dyn InvokerFactory) -> Result<(), WorkerError> {
        self.start_all(session, factory)
    }

    /// Send terminate to both processes without waiting for them to exit.
    ///
    /// Each process is terminated at most once; once anything was terminated,
    /// calling `stop` again is a no-op. If a process was never launched, the
    /// other one is still terminated and `OrchestratorNotStarted` names the
    /// missing one. Stopping a worker that launched nothing keeps reporting
    /// `OrchestratorNotStarted`.
    pub fn stop(&mut self) -> Result<(), WorkerError> {
        if self.stopped {
            return Ok(());
        }

        let webserver = self.webserver.take();
        let scheduler = self.scheduler.take();

        let mut missing = None;
        for (command, handle) in [(WEBSERVER_COMMAND, webserver), (SCHEDULER_COMMAND, scheduler)] {
            match handle {
                Some(mut handle) => {
                    self.stopped = true;
                    if let Err(e) = handle.terminate() {
                        warn!(
                            plugin = %self.plugin.name(),
                            command,
                            error = %e,
                            "failed to terminate orchestrator process"
                        );
                    }
                }
                None => {
                    if missing.is_none() {
                        missing = Some(command);
                    }
                }
            }
        }

        match missing {
            None => {
                info!(plugin = %self.plugin.name(), "orchestrator processes terminated");
                Ok(())
            }
            Some(missing) => {
                warn!(plugin = %self.plugin.name(), missing, "stop called on a partially started orchestrator");
                Err(WorkerError::OrchestratorNotStarted { missing })
            }
        }
    }

    fn launch_failed(&self, command: &str, source: anyhow::Error) -> WorkerError {
        WorkerError::PluginLaunchFailed {
            plugin: self.plugin.name().to_string(),
            command: command.to_string(),
            source,
        }
    }
}
