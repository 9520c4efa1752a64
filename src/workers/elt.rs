// src/workers/elt.rs

//! One extract-load(-transform) job as a background unit of work.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local};
use serde::Deserialize;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use crate::errors::WorkerError;
use crate::plugin::Session;
use crate::project::Project;
use crate::runner::{
    CommandExtractLoadRunner, CommandTransformRunner, EltContext, ExtractLoadRunner,
    TransformRunner,
};
use crate::types::{PluginType, TransformMode};

/// Environment variable overriding the ELT run-scratch directory.
pub const RUN_DIR_ENV: &str = "PIPEWORKER_RUN_DIR";

/// Schedule name used in job ids when the payload has none.
pub const UNNAMED_SCHEDULE: &str = "unnamed";

/// Timestamp part of a job id: date, time and microseconds.
pub const JOB_ID_TIME_FORMAT: &str = "%Y%m%d-%H:%M:%S%.6f";

/// One ELT job request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulePayload {
    pub extractor: String,
    pub loader: String,
    #[serde(default)]
    pub transform: Option<TransformMode>,
    #[serde(default)]
    pub name: Option<String>,
}

impl SchedulePayload {
    pub fn new(extractor: impl Into<String>, loader: impl Into<String>) -> Self {
        Self {
            extractor: extractor.into(),
            loader: loader.into(),
            transform: None,
            name: None,
        }
    }

    pub fn with_transform(mut self, transform: &str) -> Self {
        self.transform = Some(TransformMode::from(transform));
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn schedule_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED_SCHEDULE)
    }
}

/// `job_<schedule>_<YYYYMMDD-HH:MM:SS.ffffff>`.
///
/// Two jobs of the same schedule started within the same microsecond get the
/// same id.
pub fn job_id(schedule_name: &str, at: DateTime<Local>) -> String {
    format!("job_{}_{}", schedule_name, at.format(JOB_ID_TIME_FORMAT))
}

/// The two stage runners an ELT job delegates to.
#[derive(Clone)]
pub struct EltRunners {
    pub extract_load: Arc<dyn ExtractLoadRunner>,
    pub transform: Arc<dyn TransformRunner>,
}

impl EltRunners {
    pub fn new(extract_load: Arc<dyn ExtractLoadRunner>, transform: Arc<dyn TransformRunner>) -> Self {
        Self {
            extract_load,
            transform,
        }
    }

    /// Runners that launch the configured plugins as OS processes.
    pub fn command(project: Arc<Project>, session: Session) -> Self {
        Self {
            extract_load: Arc::new(CommandExtractLoadRunner::new(
                Arc::clone(&project),
                session.clone(),
            )),
            transform: Arc::new(CommandTransformRunner::new(project, session)),
        }
    }
}

/// Runs one ELT job.
///
/// - transform `run`: extract-load, then transform scoped to the extractor's
///   models.
/// - transform `skip`: extract-load only.
/// - anything else, including no transform at all: nothing runs. This is
///   logged as a warning since callers most likely meant "extract-load only".
///
/// The completion flag is set whether the job succeeded or not; it says the
/// worker is done, not that the job worked.
pub struct EltWorker {
    project: Arc<Project>,
    payload: SchedulePayload,
    job_id: String,
    runners: EltRunners,
    complete: Arc<AtomicBool>,
}

impl EltWorker {
    pub fn new(project: Arc<Project>, payload: SchedulePayload, runners: EltRunners) -> Self {
        let job_id = job_id(payload.schedule_name(), Local::now());
        Self {
            project,
            payload,
            job_id,
            runners,
            complete: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn payload(&self) -> &SchedulePayload {
        &self.payload
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    /// Paths and limits the stages run with.
    ///
    /// The run dir comes from `PIPEWORKER_RUN_DIR` when set, else from the
    /// project.
    pub fn context(&self) -> EltContext {
        let run_dir = std::env::var_os(RUN_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.project.run_dir());

        EltContext {
            job_id: self.job_id.clone(),
            run_dir,
            loader_config_dir: self
                .project
                .plugin_dir(PluginType::Loaders, &self.payload.loader),
            extractor_config_dir: self
                .project
                .plugin_dir(PluginType::Extractors, &self.payload.extractor),
            process_timeout: self.project.config().workers().process_timeout,
        }
    }

    /// Run the job to the end, then mark the worker complete.
    pub async fn run(&self) -> Result<(), WorkerError> {
        let ctx = self.context();
        let result = self.run_stages(&ctx).await;
        self.stop();
        result
    }

    /// Mark the worker complete. Does not interrupt a running stage.
    pub fn stop(&self) {
        self.complete.store(true, Ordering::SeqCst);
    }

    /// Run the job on its own Tokio task.
    pub fn spawn(self) -> EltJobHandle {
        let job_id = self.job_id.clone();
        let complete = Arc::clone(&self.complete);
        let handle = tokio::spawn(async move { self.run().await });
        EltJobHandle {
            job_id,
            complete,
            handle,
        }
    }

    async fn run_stages(&self, ctx: &EltContext) -> Result<(), WorkerError> {
        let extractor = self.payload.extractor.as_str();
        let loader = self.payload.loader.as_str();

        let Some(mode) = &self.payload.transform else {
            warn!(
                job_id = %self.job_id,
                "no transform mode given; neither extract-load nor transform will run"
            );
            return Ok(());
        };

        if !mode.runs_extract_load() {
            warn!(
                job_id = %self.job_id,
                transform = %mode,
                "unrecognised transform mode; neither extract-load nor transform will run"
            );
            return Ok(());
        }

        info!(
            job_id = %self.job_id,
            extractor,
            loader,
            transform = %mode,
            "ELT job started"
        );

        self.runners
            .extract_load
            .run(ctx, extractor, loader)
            .await
            .map_err(|source| {
                error!(job_id = %self.job_id, error = ?source, "extract-load failed");
                WorkerError::ExtractLoadFailed {
                    job_id: self.job_id.clone(),
                    source,
                }
            })?;

        if mode.runs_transform() {
            self.runners
                .transform
                .run(ctx, extractor, loader, extractor)
                .await
                .map_err(|source| {
                    error!(job_id = %self.job_id, error = ?source, "transform failed");
                    WorkerError::TransformFailed {
                        job_id: self.job_id.clone(),
                        source,
                    }
                })?;
        }

        info!(job_id = %self.job_id, "ELT job finished");
        Ok(())
    }
}

/// Handle on a spawned [`EltWorker`].
#[derive(Debug)]
pub struct EltJobHandle {
    job_id: String,
    complete: Arc<AtomicBool>,
    handle: JoinHandle<Result<(), WorkerError>>,
}

impl EltJobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::SeqCst)
    }

    /// Wait for the job. The outer error only reports a panicked task.
    pub async fn join(self) -> Result<Result<(), WorkerError>, JoinError> {
        self.handle.await
    }
}
