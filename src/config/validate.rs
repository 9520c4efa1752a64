// src/config/validate.rs

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::model::{
    PluginsSection, ProjectConfig, RawProjectConfig, RawWorkersSection, WorkersSection,
};
use crate::errors::{PipeworkerError, Result};

impl TryFrom<RawProjectConfig> for ProjectConfig {
    type Error = PipeworkerError;

    fn try_from(raw: RawProjectConfig) -> std::result::Result<Self, Self::Error> {
        validate_project_section(&raw)?;
        let workers = validate_workers(&raw.workers)?;
        validate_plugins(&raw.plugins)?;
        Ok(ProjectConfig::new_unchecked(
            raw.project,
            raw.compiler,
            workers,
            raw.plugins,
        ))
    }
}

fn validate_project_section(cfg: &RawProjectConfig) -> Result<()> {
    if cfg.project.model_dir.trim().is_empty() {
        return Err(PipeworkerError::ConfigError(
            "[project].model_dir must not be empty".to_string(),
        ));
    }

    for pattern in &cfg.project.watch_ignore {
        globset::Glob::new(pattern).map_err(|e| {
            PipeworkerError::ConfigError(format!(
                "invalid [project].watch_ignore pattern '{pattern}': {e}"
            ))
        })?;
    }

    if let Some(cmd) = &cfg.compiler.cmd {
        if cmd.trim().is_empty() {
            return Err(PipeworkerError::ConfigError(
                "[compiler].cmd must not be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_workers(raw: &RawWorkersSection) -> Result<WorkersSection> {
    let poll_interval = parse_config_duration("poll_interval", &raw.poll_interval)?;
    let request_timeout = parse_config_duration("request_timeout", &raw.request_timeout)?;
    let process_timeout = raw
        .process_timeout
        .as_deref()
        .map(|s| parse_config_duration("process_timeout", s))
        .transpose()?;

    if raw.poll_max_attempts == Some(0) {
        return Err(PipeworkerError::ConfigError(
            "[workers].poll_max_attempts must be >= 1 (got 0)".to_string(),
        ));
    }

    if raw.orchestrator.trim().is_empty() {
        return Err(PipeworkerError::ConfigError(
            "[workers].orchestrator must not be empty".to_string(),
        ));
    }

    Ok(WorkersSection {
        orchestrator: raw.orchestrator.clone(),
        ui_url: raw.ui_url.clone(),
        open_browser: raw.open_browser,
        poll_interval,
        poll_max_attempts: raw.poll_max_attempts,
        request_timeout,
        process_timeout,
    })
}

fn validate_plugins(plugins: &PluginsSection) -> Result<()> {
    // Plugins are looked up by bare name, so a name may only appear once.
    let mut seen: BTreeMap<&str, &'static str> = BTreeMap::new();

    let tables = [
        ("extractors", &plugins.extractors),
        ("loaders", &plugins.loaders),
        ("transformers", &plugins.transformers),
        ("orchestrators", &plugins.orchestrators),
    ];

    for (kind, table) in tables {
        for (name, plugin) in table.iter() {
            if let Some(exe) = &plugin.executable {
                if exe.trim().is_empty() {
                    return Err(PipeworkerError::ConfigError(format!(
                        "plugin '{name}' in [plugins.{kind}] has an empty executable"
                    )));
                }
            }
            if let Some(previous) = seen.insert(name.as_str(), kind) {
                return Err(PipeworkerError::ConfigError(format!(
                    "plugin '{name}' is declared in both [plugins.{previous}] and [plugins.{kind}]"
                )));
            }
        }
    }

    Ok(())
}

fn parse_config_duration(key: &str, value: &str) -> Result<Duration> {
    parse_duration(value).map_err(|e| {
        PipeworkerError::ConfigError(format!("invalid [workers].{key} '{value}': {e}"))
    })
}

/// Parse a simple duration string like `"3s"`, `"250ms"`, `"1m"`, `"2h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{s}' is too large"))
}
