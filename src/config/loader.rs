// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ProjectConfig, RawProjectConfig};
use crate::errors::Result;

/// File name of the project configuration, relative to the project root.
pub const CONFIG_FILE_NAME: &str = "pipeworker.toml";

/// Load a configuration file from a given path and return the raw `RawProjectConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawProjectConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawProjectConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Parses durations and checks plugin declarations.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ProjectConfig> {
    let raw_config = load_from_path(&path)?;
    let config = ProjectConfig::try_from(raw_config)?;
    Ok(config)
}

/// Load the configuration of the project rooted at `root`.
///
/// A project without a config file gets the default configuration.
pub fn load_project_config(root: impl AsRef<Path>) -> Result<ProjectConfig> {
    let path = config_path(root);
    if !path.is_file() {
        debug!(path = ?path, "no project config file; using defaults");
        return Ok(ProjectConfig::default());
    }
    load_and_validate(&path)
}

/// Path of the config file for the project rooted at `root`.
pub fn config_path(root: impl AsRef<Path>) -> PathBuf {
    root.as_ref().join(CONFIG_FILE_NAME)
}
