// src/workers/mod.rs

//! Background workers.
//!
//! Each worker owns exactly one concern, is started and stopped on its own
//! and never shares mutable state with another worker:
//!
//! - [`compile::BackgroundCompiler`] recompiles models on filesystem changes.
//! - [`orchestrator::OrchestratorWorker`] owns the orchestrator's webserver
//!   and scheduler processes.
//! - [`elt::EltWorker`] runs one extract-load(-transform) job.
//! - [`available::AvailabilityPoller`] waits for a URL to answer.

pub mod available;
pub mod compile;
pub mod elt;
pub mod orchestrator;

pub use available::{
    AvailabilityHandle, AvailabilityPoller, BrowserLauncher, HttpProbe, PollOptions, PollOutcome,
    ReqwestProbe, SystemBrowser,
};
pub use compile::{AutoCompile, BackgroundCompiler, CompileEventFilter, CompileEventHandler};
pub use elt::{EltJobHandle, EltRunners, EltWorker, SchedulePayload, job_id};
pub use orchestrator::OrchestratorWorker;
