// src/runner/extract_load.rs

//! Extractor → loader pipeline over OS pipes.

use std::process::Stdio;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info};

use crate::plugin::process::{drain_lines, ensure_success, wait_bounded};
use crate::plugin::{CommandInvokerFactory, PluginInstall, Session};
use crate::project::Project;
use crate::runner::{CONFIG_DIR_ENV, EltContext, ExtractLoadRunner, JOB_ID_ENV, RunFuture};
use crate::types::PluginType;

/// Production extract-load runner.
///
/// Spawns the extractor with its stdout connected to the loader's stdin and
/// requires both to exit successfully. Each side sees the job id and its own
/// config directory in its environment.
pub struct CommandExtractLoadRunner {
    project: Arc<Project>,
    session: Session,
    factory: CommandInvokerFactory,
}

impl CommandExtractLoadRunner {
    pub fn new(project: Arc<Project>, session: Session) -> Self {
        Self {
            project,
            session,
            factory: CommandInvokerFactory::new(),
        }
    }

    async fn run_pipeline(&self, ctx: &EltContext, extractor: &str, loader: &str) -> Result<()> {
        let service = self.project.config_service();
        let tap = service.find_plugin_of_type(PluginType::Extractors, extractor)?;
        let target = service.find_plugin_of_type(PluginType::Loaders, loader)?;

        for dir in [&ctx.run_dir, &ctx.extractor_config_dir, &ctx.loader_config_dir] {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {:?}", dir))?;
        }

        let mut tap_cmd = self.stage_command(&tap, "extract")?;
        tap_cmd
            .env(JOB_ID_ENV, &ctx.job_id)
            .env(CONFIG_DIR_ENV, &ctx.extractor_config_dir)
            .current_dir(&ctx.run_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut target_cmd = self.stage_command(&target, "load")?;
        target_cmd
            .env(JOB_ID_ENV, &ctx.job_id)
            .env(CONFIG_DIR_ENV, &ctx.loader_config_dir)
            .current_dir(&ctx.run_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(
            job_id = %ctx.job_id,
            extractor = %extractor,
            loader = %loader,
            "starting extract-load"
        );

        let mut tap_child = tap_cmd
            .spawn()
            .with_context(|| format!("spawning extractor '{extractor}'"))?;
        let mut target_child = target_cmd
            .spawn()
            .with_context(|| format!("spawning loader '{loader}'"))?;

        let mut tap_stdout = tap_child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("extractor '{extractor}' has no stdout pipe"))?;
        let mut target_stdin = target_child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("loader '{loader}' has no stdin pipe"))?;

        if let Some(stderr) = tap_child.stderr.take() {
            drain_lines(stderr, extractor.to_string(), "stderr");
        }
        if let Some(stderr) = target_child.stderr.take() {
            drain_lines(stderr, loader.to_string(), "stderr");
        }
        if let Some(stdout) = target_child.stdout.take() {
            drain_lines(stdout, loader.to_string(), "stdout");
        }

        // Dropping stdin at the end of the copy is what tells the loader the
        // stream is over.
        let pump = tokio::spawn(async move {
            let copied = tokio::io::copy(&mut tap_stdout, &mut target_stdin).await;
            drop(target_stdin);
            copied
        });

        let tap_status = wait_bounded(
            &mut tap_child,
            ctx.process_timeout,
            &format!("extractor '{extractor}'"),
        )
        .await?;

        let copied = pump
            .await
            .context("extract-load pipe task panicked")?
            .context("piping extractor output into loader")?;
        debug!(job_id = %ctx.job_id, bytes = copied, "extractor output forwarded");

        let target_status = wait_bounded(
            &mut target_child,
            ctx.process_timeout,
            &format!("loader '{loader}'"),
        )
        .await?;

        ensure_success(tap_status, &format!("extractor '{extractor}'"))?;
        ensure_success(target_status, &format!("loader '{loader}'"))?;

        info!(job_id = %ctx.job_id, "extract-load finished");
        Ok(())
    }

    fn stage_command(&self, plugin: &PluginInstall, command: &str) -> Result<tokio::process::Command> {
        let invoker = self.factory.invoker(&self.session, &self.project, plugin)?;
        // Without a configured command the bare executable is run.
        let command = if plugin.has_command(command) { command } else { "" };
        Ok(invoker.command(command))
    }
}

impl ExtractLoadRunner for CommandExtractLoadRunner {
    fn run<'a>(
        &'a self,
        ctx: &'a EltContext,
        extractor: &'a str,
        loader: &'a str,
    ) -> RunFuture<'a> {
        Box::pin(self.run_pipeline(ctx, extractor, loader))
    }
}
