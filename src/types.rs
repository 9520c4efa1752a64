// src/types.rs

//! Small string-backed enums shared by config and workers.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Kind of external tool a plugin wraps.
///
/// The lowercase plural form is used both as the TOML table name
/// (`[plugins.extractors.<name>]`) and as the per-plugin directory name under
/// the project's system directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    Extractors,
    Loaders,
    Transformers,
    Orchestrators,
}

impl PluginType {
    pub const ALL: [PluginType; 4] = [
        PluginType::Extractors,
        PluginType::Loaders,
        PluginType::Transformers,
        PluginType::Orchestrators,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PluginType::Extractors => "extractors",
            PluginType::Loaders => "loaders",
            PluginType::Transformers => "transformers",
            PluginType::Orchestrators => "orchestrators",
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "extractors" | "extractor" => Ok(PluginType::Extractors),
            "loaders" | "loader" => Ok(PluginType::Loaders),
            "transformers" | "transformer" => Ok(PluginType::Transformers),
            "orchestrators" | "orchestrator" => Ok(PluginType::Orchestrators),
            other => Err(format!(
                "invalid plugin type: {other} (expected extractors, loaders, transformers or orchestrators)"
            )),
        }
    }
}

/// What an ELT job does about the transform step.
///
/// - `Run`: extract-load, then transform.
/// - `Skip`: extract-load only.
/// - `Other`: any unrecognised value. Nothing runs for it (see `EltWorker`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformMode {
    Run,
    Skip,
    Other(String),
}

impl TransformMode {
    pub fn runs_extract_load(&self) -> bool {
        matches!(self, TransformMode::Run | TransformMode::Skip)
    }

    pub fn runs_transform(&self) -> bool {
        matches!(self, TransformMode::Run)
    }
}

impl From<&str> for TransformMode {
    fn from(s: &str) -> Self {
        match s {
            "run" => TransformMode::Run,
            "skip" => TransformMode::Skip,
            other => TransformMode::Other(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for TransformMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(TransformMode::from(s.as_str()))
    }
}

impl fmt::Display for TransformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformMode::Run => f.write_str("run"),
            TransformMode::Skip => f.write_str("skip"),
            TransformMode::Other(s) => f.write_str(s),
        }
    }
}
