// src/errors.rs

//! Crate-wide error types.
//!
//! - [`PipeworkerError`] covers loading the project and its configuration.
//! - [`WorkerError`] is what the background workers report. Each variant names
//!   the failing stage and keeps the underlying cause as `source()`.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::PluginType;

#[derive(Error, Debug)]
pub enum PipeworkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure kinds surfaced by the background workers.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("model auto-compilation could not watch {path:?}")]
    WatchStartFailed {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("ELT could not complete ({job_id}): extract-load stage failed")]
    ExtractLoadFailed {
        job_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("ELT could not complete ({job_id}): transform stage failed")]
    TransformFailed {
        job_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to launch '{command}' for plugin '{plugin}'")]
    PluginLaunchFailed {
        plugin: String,
        command: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("orchestrator was not fully started; no {missing} process to terminate")]
    OrchestratorNotStarted { missing: &'static str },

    #[error("plugin '{name}' not found{}", kind_suffix(.plugin_type))]
    PluginNotFound {
        name: String,
        plugin_type: Option<PluginType>,
    },
}

fn kind_suffix(plugin_type: &Option<PluginType>) -> String {
    match plugin_type {
        Some(t) => format!(" among {t}"),
        None => String::new(),
    }
}

impl WorkerError {
    /// True for both ELT stage failures.
    pub fn is_elt_failure(&self) -> bool {
        matches!(
            self,
            WorkerError::ExtractLoadFailed { .. } | WorkerError::TransformFailed { .. }
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipeworkerError>;
