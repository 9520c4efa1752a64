// src/workers/compile.rs

//! Change-triggered model recompilation.

use std::path::PathBuf;
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::compiler::{Compiler, ProjectCompiler};
use crate::errors::WorkerError;
use crate::project::Project;

/// Compiled artifacts. Changes to these never trigger a recompile.
pub const COMPILED_ARTIFACT_GLOB: &str = "*.m5oc";

/// Result of [`BackgroundCompiler::start`].
#[derive(Debug)]
pub enum AutoCompile {
    Enabled,
    /// The watch could not be set up; the host keeps running without live
    /// recompilation.
    Disabled(WorkerError),
}

impl AutoCompile {
    pub fn is_enabled(&self) -> bool {
        matches!(self, AutoCompile::Enabled)
    }
}

/// Decides which filesystem events warrant a recompile.
#[derive(Debug, Clone)]
pub struct CompileEventFilter {
    ignore: GlobSet,
}

impl CompileEventFilter {
    /// Filter ignoring compiled artifacts plus `extra_ignores`.
    ///
    /// Invalid extra patterns are skipped with a warning.
    pub fn new(extra_ignores: &[String]) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in std::iter::once(COMPILED_ARTIFACT_GLOB).chain(extra_ignores.iter().map(String::as_str)) {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => warn!(pattern = %pattern, error = %e, "invalid watch ignore pattern; skipping"),
            }
        }
        let ignore = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "failed to build watch ignore set; ignoring nothing");
            GlobSet::empty()
        });
        Self { ignore }
    }

    /// True if `event` is a change and touches at least one non-ignored path.
    pub fn should_compile(&self, event: &Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }
        // Path-less events (e.g. rescans) may hide any change.
        if event.paths.is_empty() {
            return true;
        }
        event.paths.iter().any(|p| !self.ignore.is_match(p))
    }
}

impl Default for CompileEventFilter {
    fn default() -> Self {
        Self::new(&[])
    }
}

/// Runs the compiler for each relevant event, never letting a failure escape.
#[derive(Clone)]
pub struct CompileEventHandler {
    compiler: Arc<dyn Compiler>,
    filter: CompileEventFilter,
}

impl CompileEventHandler {
    pub fn new(compiler: Arc<dyn Compiler>, filter: CompileEventFilter) -> Self {
        Self { compiler, filter }
    }

    /// Handle one event. Returns whether a compile was attempted.
    pub async fn on_event(&self, event: Event) -> bool {
        if !self.filter.should_compile(&event) {
            debug!(?event, "ignoring filesystem event");
            return false;
        }

        debug!(kind = ?event.kind, paths = ?event.paths, "model change detected; recompiling");

        let compiler = Arc::clone(&self.compiler);
        match tokio::task::spawn_blocking(move || compiler.compile()).await {
            Ok(Ok(())) => debug!("recompile finished"),
            Ok(Err(e)) => error!("Compilation failed: {e:#}"),
            Err(e) => error!(error = %e, "compiler panicked"),
        }
        true
    }
}

/// Watches a project's model directory and recompiles on every change.
///
/// Events are handled one at a time by a single Tokio task. Compile failures
/// are logged and the watch keeps going.
pub struct BackgroundCompiler {
    model_dir: PathBuf,
    handler: CompileEventHandler,
    watcher: Option<RecommendedWatcher>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl BackgroundCompiler {
    /// `compiler` defaults to a [`ProjectCompiler`] for `project`.
    pub fn new(project: Arc<Project>, compiler: Option<Arc<dyn Compiler>>) -> Self {
        let compiler =
            compiler.unwrap_or_else(|| Arc::new(ProjectCompiler::new(&project)) as Arc<dyn Compiler>);
        let filter = CompileEventFilter::new(&project.config().project().watch_ignore);
        Self {
            model_dir: project.model_dir(),
            handler: CompileEventHandler::new(compiler, filter),
            watcher: None,
            shutdown: CancellationToken::new(),
            task: None,
        }
    }

    pub fn model_dir(&self) -> &PathBuf {
        &self.model_dir
    }

    pub fn is_running(&self) -> bool {
        self.watcher.is_some()
    }

    /// Start watching. Must be called from within a Tokio runtime.
    ///
    /// Never fails: a watch that cannot be set up (e.g. the inotify watch
    /// limit is reached) is logged and reported as [`AutoCompile::Disabled`].
    pub fn start(&mut self) -> AutoCompile {
        if self.is_running() {
            return AutoCompile::Enabled;
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();

        let watcher = match self.setup_watcher(event_tx) {
            Ok(w) => w,
            Err(err) => {
                if let WorkerError::WatchStartFailed { source, .. } = &err {
                    if matches!(source.kind, notify::ErrorKind::MaxFilesWatch) {
                        warn!("Model auto-compilation is disabled: INotify limit reached.");
                        return AutoCompile::Disabled(err);
                    }
                }
                warn!(error = %err, "Model auto-compilation is disabled");
                return AutoCompile::Disabled(err);
            }
        };

        self.shutdown = CancellationToken::new();
        let shutdown = self.shutdown.clone();
        let handler = self.handler.clone();
        self.task = Some(tokio::spawn(run_event_loop(handler, event_rx, shutdown)));
        self.watcher = Some(watcher);

        info!("Auto-compiling models in {:?}", self.model_dir);
        AutoCompile::Enabled
    }

    /// Stop watching. Safe to call repeatedly or before `start`.
    pub fn stop(&mut self) {
        self.shutdown.cancel();
        if self.watcher.take().is_some() {
            info!("stopped auto-compiling models in {:?}", self.model_dir);
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn setup_watcher(
        &self,
        event_tx: mpsc::UnboundedSender<Event>,
    ) -> Result<RecommendedWatcher, WorkerError> {
        let watch_failed = |source: notify::Error| WorkerError::WatchStartFailed {
            path: self.model_dir.clone(),
            source,
        };

        // Closure called synchronously by notify whenever an event arrives.
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event_tx.send(event).is_err() {
                        debug!("compile event loop gone; dropping filesystem event");
                    }
                }
                Err(err) => warn!(error = %err, "file watch error"),
            },
            Config::default(),
        )
        .map_err(watch_failed)?;

        watcher
            .watch(&self.model_dir, RecursiveMode::Recursive)
            .map_err(watch_failed)?;

        Ok(watcher)
    }
}

impl Drop for BackgroundCompiler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_event_loop(
    handler: CompileEventHandler,
    mut event_rx: mpsc::UnboundedReceiver<Event>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = event_rx.recv() => match event {
                Some(event) => {
                    handler.on_event(event).await;
                }
                None => break,
            },
        }
    }
    debug!("compile event loop finished");
}
