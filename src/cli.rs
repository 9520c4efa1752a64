// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `pipeworker`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pipeworker",
    version,
    about = "Run and supervise the background workers of a data-pipeline project.",
    long_about = None
)]
pub struct CliArgs {
    /// Project root (the directory holding `pipeworker.toml`).
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    pub project: PathBuf,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PIPEWORKER_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    /// Load + validate the project, print what would run, and exit.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Recompile models whenever the model directory changes.
    Watch,

    /// Start the orchestrator's webserver and scheduler until Ctrl-C.
    Orchestrate {
        /// Orchestrator plugin to run. Defaults to `[workers].orchestrator`.
        #[arg(long, value_name = "NAME")]
        plugin: Option<String>,
    },

    /// Run a single extract-load(-transform) job.
    Elt {
        /// Extractor plugin name.
        extractor: String,

        /// Loader plugin name.
        loader: String,

        /// `run` or `skip`. Without it, nothing runs.
        #[arg(long, value_name = "MODE")]
        transform: Option<String>,

        /// Schedule name used in the job id.
        #[arg(long, value_name = "NAME")]
        schedule: Option<String>,
    },

    /// Wait until a URL answers 200 OK.
    WaitUi {
        /// URL to poll. Defaults to `[workers].ui_url`.
        #[arg(long, value_name = "URL")]
        url: Option<String>,

        /// Open the URL in a browser once it is available.
        #[arg(long)]
        open_browser: bool,

        /// Give up after this many attempts.
        #[arg(long, value_name = "N")]
        max_attempts: Option<u32>,
    },

    /// Auto-compile, run the orchestrator and wait for the UI until Ctrl-C.
    Up {
        /// Do not start the orchestrator.
        #[arg(long)]
        no_orchestrator: bool,

        /// Open the UI in a browser once it is available.
        #[arg(long)]
        open_browser: bool,
    },
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
