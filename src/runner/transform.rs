// src/runner/transform.rs

//! Runs the project transformer after a successful extract-load.

use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tracing::info;

use crate::plugin::process::{drain_lines, ensure_success, wait_bounded};
use crate::plugin::{CommandInvokerFactory, Session};
use crate::project::Project;
use crate::runner::{EltContext, JOB_ID_ENV, RunFuture, TransformRunner};
use crate::types::PluginType;

pub const EXTRACTOR_ENV: &str = "PIPEWORKER_EXTRACTOR";
pub const LOADER_ENV: &str = "PIPEWORKER_LOADER";

/// Production transform runner.
///
/// Runs the `run` command of the project's transformer plugin with
/// `--models <models>` appended. With several transformers configured, the
/// first by name is used.
pub struct CommandTransformRunner {
    project: Arc<Project>,
    session: Session,
    factory: CommandInvokerFactory,
}

impl CommandTransformRunner {
    pub fn new(project: Arc<Project>, session: Session) -> Self {
        Self {
            project,
            session,
            factory: CommandInvokerFactory::new(),
        }
    }

    async fn run_transform(
        &self,
        ctx: &EltContext,
        extractor: &str,
        loader: &str,
        models: &str,
    ) -> Result<()> {
        let transformer = self
            .project
            .config_service()
            .plugins_of_type(PluginType::Transformers)
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no transformer plugin configured"))?;

        let invoker = self
            .factory
            .invoker(&self.session, &self.project, &transformer)?;
        let mut cmd = invoker.command_with_args("run", &["--models", models]);
        cmd.env(JOB_ID_ENV, &ctx.job_id)
            .env(EXTRACTOR_ENV, extractor)
            .env(LOADER_ENV, loader)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            job_id = %ctx.job_id,
            transformer = %transformer.name(),
            models = %models,
            "starting transform"
        );

        let what = format!("transformer '{}'", transformer.name());
        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning {what}"))?;

        if let Some(stdout) = child.stdout.take() {
            drain_lines(stdout, transformer.name().to_string(), "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            drain_lines(stderr, transformer.name().to_string(), "stderr");
        }

        let status = wait_bounded(&mut child, ctx.process_timeout, &what).await?;
        ensure_success(status, &what)?;

        info!(job_id = %ctx.job_id, "transform finished");
        Ok(())
    }
}

impl TransformRunner for CommandTransformRunner {
    fn run<'a>(
        &'a self,
        ctx: &'a EltContext,
        extractor: &'a str,
        loader: &'a str,
        models: &'a str,
    ) -> RunFuture<'a> {
        Box::pin(self.run_transform(ctx, extractor, loader, models))
    }
}
