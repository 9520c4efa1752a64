// src/lib.rs

pub mod cli;
pub mod compiler;
pub mod config;
pub mod errors;
pub mod logging;
pub mod plugin;
pub mod project;
pub mod runner;
pub mod types;
pub mod workers;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command};
use crate::errors::WorkerError;
use crate::plugin::{CommandInvokerFactory, PluginInstall, Session};
use crate::project::Project;
use crate::types::PluginType;
use crate::workers::{
    AvailabilityPoller, BackgroundCompiler, EltRunners, EltWorker, OrchestratorWorker,
    PollOptions, PollOutcome, SchedulePayload,
};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - project + config loading
/// - the worker(s) the subcommand asks for
/// - Ctrl-C handling for the long-running ones
pub async fn run(args: CliArgs) -> Result<()> {
    let project = Arc::new(open_project(&args.project)?);

    if args.dry_run {
        print_dry_run(&project, &args.command);
        return Ok(());
    }

    let session = Session::new("cli");

    match args.command {
        Command::Watch => run_watch(project).await,
        Command::Orchestrate { plugin } => run_orchestrate(project, &session, plugin).await,
        Command::Elt {
            extractor,
            loader,
            transform,
            schedule,
        } => {
            let mut payload = SchedulePayload::new(extractor, loader);
            if let Some(mode) = transform {
                payload = payload.with_transform(&mode);
            }
            if let Some(name) = schedule {
                payload = payload.with_name(name);
            }
            run_elt(project, session, payload).await
        }
        Command::WaitUi {
            url,
            open_browser,
            max_attempts,
        } => {
            let url = url.unwrap_or_else(|| project.config().workers().ui_url.clone());
            let poller = build_poller(&project, url, open_browser, max_attempts)?;
            let outcome = tokio::select! {
                outcome = poller.run() => outcome,
                _ = shutdown_signal() => {
                    info!("shutdown requested; stopping availability poller");
                    return Ok(());
                }
            };
            report_poll_outcome(outcome)
        }
        Command::Up {
            no_orchestrator,
            open_browser,
        } => run_up(project, &session, no_orchestrator, open_browser).await,
    }
}

fn open_project(root: &Path) -> Result<Project> {
    Project::open(root).with_context(|| format!("opening project at {:?}", root))
}

async fn run_watch(project: Arc<Project>) -> Result<()> {
    let mut compiler = BackgroundCompiler::new(project, None);
    if !compiler.start().is_enabled() {
        return Ok(());
    }
    shutdown_signal().await;
    compiler.stop();
    Ok(())
}

async fn run_orchestrate(
    project: Arc<Project>,
    session: &Session,
    plugin: Option<String>,
) -> Result<()> {
    let plugin = plugin
        .map(|name| {
            project
                .config_service()
                .find_plugin_of_type(PluginType::Orchestrators, &name)
        })
        .transpose()?;

    let mut orchestrator = OrchestratorWorker::new(project, plugin)?;
    let started = orchestrator.start_all(session, &CommandInvokerFactory::new());
    if let Err(err) = started {
        // Reap whatever did start before reporting the launch failure.
        if let Err(stop_err) = orchestrator.stop() {
            debug!(error = %stop_err, "orchestrator was only partially started");
        }
        return Err(err.into());
    }

    shutdown_signal().await;
    orchestrator.stop()?;
    Ok(())
}

async fn run_elt(project: Arc<Project>, session: Session, payload: SchedulePayload) -> Result<()> {
    let runners = EltRunners::command(Arc::clone(&project), session);
    let worker = EltWorker::new(project, payload, runners);
    let handle = worker.spawn();
    let job_id = handle.job_id().to_string();
    info!(job_id = %job_id, "ELT job spawned");

    handle
        .join()
        .await
        .context("ELT job task failed")??;

    println!("{job_id}");
    Ok(())
}

async fn run_up(
    project: Arc<Project>,
    session: &Session,
    no_orchestrator: bool,
    open_browser: bool,
) -> Result<()> {
    let workers_cfg = project.config().workers().clone();

    let mut compiler = BackgroundCompiler::new(Arc::clone(&project), None);
    compiler.start();

    let mut orchestrator = if no_orchestrator {
        None
    } else {
        match OrchestratorWorker::new(Arc::clone(&project), None) {
            Ok(mut worker) => {
                worker.start_all(session, &CommandInvokerFactory::new())?;
                Some(worker)
            }
            Err(WorkerError::PluginNotFound { name, .. }) => {
                warn!(plugin = %name, "orchestrator not configured; running without it");
                None
            }
            Err(e) => return Err(e.into()),
        }
    };

    let poller = build_poller(
        &project,
        workers_cfg.ui_url.clone(),
        open_browser || workers_cfg.open_browser,
        None,
    )?;
    let poll_handle = poller.spawn();

    shutdown_signal().await;
    info!("shutdown requested; stopping workers");

    poll_handle.stop();
    if let Some(orchestrator) = orchestrator.as_mut() {
        if let Err(e) = orchestrator.stop() {
            warn!(error = %e, "orchestrator stop reported a problem");
        }
    }
    compiler.stop();

    match poll_handle.join().await {
        Ok(outcome) => debug!(?outcome, "availability poller finished"),
        Err(e) => warn!(error = %e, "availability poller task failed"),
    }
    Ok(())
}

fn build_poller(
    project: &Project,
    url: String,
    open_browser: bool,
    max_attempts: Option<u32>,
) -> Result<AvailabilityPoller> {
    let workers_cfg = project.config().workers();
    let options = PollOptions {
        interval: workers_cfg.poll_interval,
        max_attempts: max_attempts.or(workers_cfg.poll_max_attempts),
    };
    Ok(AvailabilityPoller::new(url, open_browser, workers_cfg.request_timeout)?.with_options(options))
}

fn report_poll_outcome(outcome: PollOutcome) -> Result<()> {
    match outcome {
        PollOutcome::Available { .. } | PollOutcome::Stopped { .. } => Ok(()),
        PollOutcome::GaveUp { attempts } => Err(anyhow::anyhow!(
            "URL did not become available after {attempts} attempts"
        )),
    }
}

/// Resolves once Ctrl-C is received (or immediately if it cannot be
/// listened for).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
    }
}

/// Simple dry-run output: print the resolved project and plugins.
fn print_dry_run(project: &Project, command: &Command) {
    let cfg = project.config();
    println!("pipeworker dry-run");
    println!("  project.root = {:?}", project.root());
    println!("  project.model_dir = {:?}", project.model_dir());
    println!("  project.run_dir = {:?}", project.run_dir());
    println!("  compiler.cmd = {:?}", cfg.compiler().cmd);
    println!("  workers.orchestrator = {}", cfg.workers().orchestrator);
    println!("  workers.ui_url = {}", cfg.workers().ui_url);
    println!("  workers.poll_interval = {:?}", cfg.workers().poll_interval);
    if let Some(timeout) = cfg.workers().process_timeout {
        println!("  workers.process_timeout = {timeout:?}");
    }
    println!();

    let service = project.config_service();
    for plugin_type in PluginType::ALL {
        let plugins = service.plugins_of_type(plugin_type);
        if plugins.is_empty() {
            continue;
        }
        println!("{plugin_type} ({}):", plugins.len());
        for plugin in plugins {
            print_plugin(project, &plugin);
        }
    }

    println!();
    println!("command: {command:?}");
    debug!("dry-run complete (no execution)");
}

fn print_plugin(project: &Project, plugin: &PluginInstall) {
    println!("  - {}", plugin.name());
    println!("      executable: {}", plugin.executable());
    println!(
        "      config dir: {:?}",
        project.plugin_dir(plugin.plugin_type(), plugin.name())
    );
    if !plugin.settings().is_empty() {
        let keys: Vec<&String> = plugin.settings().keys().collect();
        println!("      settings: {keys:?}");
    }
}
