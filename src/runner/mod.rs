// src/runner/mod.rs

//! ELT stage runners.
//!
//! The ELT worker only decides *which* stages run. How a stage runs is behind
//! [`ExtractLoadRunner`] and [`TransformRunner`]:
//!
//! - [`extract_load`] pipes an extractor's output into a loader.
//! - [`transform`] runs the transformer plugin scoped to a model selection.
//!
//! Tests replace both with recording fakes.

pub mod extract_load;
pub mod transform;

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

pub use extract_load::CommandExtractLoadRunner;
pub use transform::CommandTransformRunner;

/// Environment variable carrying the job id into stage processes.
pub const JOB_ID_ENV: &str = "PIPEWORKER_JOB_ID";
/// Environment variable carrying a plugin's own config directory.
pub const CONFIG_DIR_ENV: &str = "PIPEWORKER_CONFIG_DIR";

/// Future returned by the runner traits.
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Everything a stage needs to know about the job it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EltContext {
    pub job_id: String,
    pub run_dir: PathBuf,
    pub loader_config_dir: PathBuf,
    pub extractor_config_dir: PathBuf,
    /// Bound on each stage process. `None` waits forever.
    pub process_timeout: Option<Duration>,
}

/// Runs the extract + load stage.
pub trait ExtractLoadRunner: Send + Sync {
    fn run<'a>(&'a self, ctx: &'a EltContext, extractor: &'a str, loader: &'a str)
    -> RunFuture<'a>;
}

/// Runs the transform stage.
pub trait TransformRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        ctx: &'a EltContext,
        extractor: &'a str,
        loader: &'a str,
        models: &'a str,
    ) -> RunFuture<'a>;
}
