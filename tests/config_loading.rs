// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::{NamedTempFile, TempDir};

use pipeworker::config::{CONFIG_FILE_NAME, load_and_validate, load_project_config, parse_duration};
use pipeworker::errors::{PipeworkerError, WorkerError};
use pipeworker::project::Project;
use pipeworker::types::PluginType;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

fn expect_config_error(contents: &str, needle: &str) {
    let file = config_file(contents);
    match load_and_validate(file.path()) {
        Err(PipeworkerError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "message {msg:?} does not mention {needle:?}")
        }
        Err(e) => panic!("expected ConfigError, got: {e:?}"),
        Ok(_) => panic!("expected error, got Ok"),
    }
}

#[test]
fn full_config_is_loaded_and_validated() {
    let file = config_file(
        r#"
[project]
model_dir = "models"
watch_ignore = ["**/*.tmp"]

[compiler]
cmd = "make compile"

[workers]
orchestrator = "airflow"
ui_url = "http://localhost:8080"
open_browser = true
poll_interval = "500ms"
poll_max_attempts = 10
request_timeout = "1s"
process_timeout = "2m"

[plugins.extractors.tap-gitlab]
executable = "tap-gitlab"
commands = { extract = "--config config.json" }
settings = { start_date = "2024-01-01" }

[plugins.loaders.target-postgres]

[plugins.orchestrators.airflow]
executable = "airflow"
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.project().model_dir, "models");
    assert_eq!(cfg.project().watch_ignore, vec!["**/*.tmp"]);
    assert_eq!(cfg.compiler().cmd.as_deref(), Some("make compile"));

    let workers = cfg.workers();
    assert_eq!(workers.ui_url, "http://localhost:8080");
    assert!(workers.open_browser);
    assert_eq!(workers.poll_interval, Duration::from_millis(500));
    assert_eq!(workers.poll_max_attempts, Some(10));
    assert_eq!(workers.request_timeout, Duration::from_secs(1));
    assert_eq!(workers.process_timeout, Some(Duration::from_secs(120)));

    let tap = &cfg.plugins().extractors["tap-gitlab"];
    assert_eq!(tap.commands["extract"], "--config config.json");
    assert_eq!(tap.settings["start_date"], "2024-01-01");
    assert!(cfg.plugins().loaders.contains_key("target-postgres"));
}

#[test]
fn empty_config_uses_defaults() {
    let file = config_file("");
    let cfg = load_and_validate(file.path()).unwrap();

    assert_eq!(cfg.project().model_dir, "model");
    assert!(cfg.compiler().cmd.is_none());
    assert_eq!(cfg.workers().orchestrator, "airflow");
    assert_eq!(cfg.workers().ui_url, "http://localhost:5000");
    assert_eq!(cfg.workers().poll_interval, Duration::from_secs(2));
    assert_eq!(cfg.workers().request_timeout, Duration::from_secs(5));
    assert!(cfg.workers().poll_max_attempts.is_none());
    assert!(cfg.workers().process_timeout.is_none());
    assert!(!cfg.workers().open_browser);
}

#[test]
fn invalid_duration_is_a_config_error() {
    expect_config_error("[workers]\npoll_interval = \"soon\"\n", "poll_interval");
    expect_config_error("[workers]\nprocess_timeout = \"5d\"\n", "process_timeout");
}

#[test]
fn zero_poll_attempts_is_rejected() {
    expect_config_error("[workers]\npoll_max_attempts = 0\n", "poll_max_attempts");
}

#[test]
fn empty_model_dir_and_compiler_cmd_are_rejected() {
    expect_config_error("[project]\nmodel_dir = \"  \"\n", "model_dir");
    expect_config_error("[compiler]\ncmd = \"\"\n", "[compiler].cmd");
}

#[test]
fn invalid_ignore_glob_is_rejected() {
    expect_config_error("[project]\nwatch_ignore = [\"a[\"]\n", "watch_ignore");
}

#[test]
fn plugin_name_may_only_be_declared_once() {
    expect_config_error(
        "[plugins.extractors.csv]\n[plugins.loaders.csv]\n",
        "declared in both",
    );
}

#[test]
fn empty_plugin_executable_is_rejected() {
    expect_config_error(
        "[plugins.loaders.target-csv]\nexecutable = \"\"\n",
        "empty executable",
    );
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let file = config_file("[workers\norchestrator = ");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(PipeworkerError::TomlError(_))
    ));
}

#[test]
fn missing_project_config_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let cfg = load_project_config(dir.path()).unwrap();
    assert_eq!(cfg.project().model_dir, "model");
}

#[test]
fn project_open_reads_config_and_derives_paths() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "[project]\nmodel_dir = \"transform/models\"\n\n[plugins.transformers.dbt]\n",
    )
    .unwrap();

    let project = Project::open(dir.path()).unwrap();
    let root = dir.path().canonicalize().unwrap();

    assert_eq!(project.root(), root);
    assert_eq!(project.model_dir(), root.join("transform/models"));
    assert_eq!(project.run_dir(), root.join(".pipeworker/run"));
    assert_eq!(
        project.plugin_dir(PluginType::Transformers, "dbt"),
        root.join(".pipeworker/transformers/dbt")
    );

    let dbt = project.config_service().find_plugin("dbt").unwrap();
    assert_eq!(dbt.plugin_type(), PluginType::Transformers);
    assert_eq!(dbt.executable(), "dbt");
}

#[test]
fn unknown_plugin_lookup_names_the_plugin() {
    let dir = TempDir::new().unwrap();
    let project = Project::open(dir.path()).unwrap();

    let err = project
        .config_service()
        .find_plugin_of_type(PluginType::Loaders, "target-x")
        .unwrap_err();
    assert!(matches!(err, WorkerError::PluginNotFound { .. }));
    assert_eq!(err.to_string(), "plugin 'target-x' not found among loaders");
}

#[test]
fn durations_accept_common_units() {
    assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
    assert_eq!(parse_duration("3m").unwrap(), Duration::from_secs(180));
    assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("ms").is_err());
}

#[test]
fn oversized_durations_are_errors_not_panics() {
    assert!(parse_duration("18446744073709551615m").is_err());
    assert!(parse_duration("18446744073709551615h").is_err());
    assert_eq!(
        parse_duration("18446744073709551615s").unwrap(),
        Duration::from_secs(u64::MAX)
    );

    expect_config_error(
        "[workers]\nprocess_timeout = \"18446744073709551615m\"\n",
        "process_timeout",
    );
}
