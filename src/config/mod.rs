// src/config/mod.rs

//! Project configuration.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load `pipeworker.toml` from disk (`loader.rs`).
//! - Validate it into a `ProjectConfig` (`validate.rs`).
//! - Look up configured plugins (`service.rs`).

pub mod loader;
pub mod model;
pub mod service;
pub mod validate;

pub use loader::{CONFIG_FILE_NAME, config_path, load_and_validate, load_from_path, load_project_config};
pub use model::{
    CompilerSection, PluginConfig, PluginsSection, ProjectConfig, ProjectSection,
    RawProjectConfig, RawWorkersSection, WorkersSection,
};
pub use service::ConfigService;
pub use validate::parse_duration;
