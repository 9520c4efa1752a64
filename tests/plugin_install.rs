// tests/plugin_install.rs

use pipeworker::config::PluginConfig;
use pipeworker::plugin::{PluginInstall, Session};
use pipeworker::types::{PluginType, TransformMode};
use pipeworker_test_utils::builders::PluginConfigBuilder;

#[test]
fn command_line_maps_configured_commands_and_passes_others_through() {
    let plugin = PluginInstall::new(PluginType::Orchestrators, "airflow")
        .with_command("webserver", "webserver -p 8080");

    assert_eq!(plugin.command_line("webserver"), "airflow webserver -p 8080");
    assert_eq!(plugin.command_line("scheduler"), "airflow scheduler");
    assert_eq!(plugin.command_line(""), "airflow");
}

#[test]
fn executable_defaults_to_plugin_name() {
    let cfg: PluginConfig = PluginConfigBuilder::new().setting("token", "t0k").build();
    let plugin = PluginInstall::from_config(PluginType::Extractors, "tap-gitlab", &cfg);

    assert_eq!(plugin.executable(), "tap-gitlab");

    let cfg = PluginConfigBuilder::new().executable("/opt/bin/tap").build();
    let plugin = PluginInstall::from_config(PluginType::Extractors, "tap-gitlab", &cfg);
    assert_eq!(plugin.executable(), "/opt/bin/tap");
}

#[test]
fn settings_become_prefixed_env_vars() {
    let plugin = PluginInstall::new(PluginType::Extractors, "tap-gitlab")
        .with_setting("start_date", "2024-01-01")
        .with_setting("api.url", "https://gitlab.example");

    assert_eq!(
        plugin.settings_env(),
        vec![
            ("TAP_GITLAB_API_URL".to_string(), "https://gitlab.example".to_string()),
            ("TAP_GITLAB_START_DATE".to_string(), "2024-01-01".to_string()),
        ]
    );
}

#[test]
fn default_session_has_no_env() {
    let session = Session::default();
    assert_eq!(session.label(), "default");
    assert!(session.env().is_empty());
}

#[test]
fn plugin_types_parse_singular_and_plural() {
    assert_eq!("loader".parse::<PluginType>().unwrap(), PluginType::Loaders);
    assert_eq!("Orchestrators".parse::<PluginType>().unwrap(), PluginType::Orchestrators);
    assert!("utilities".parse::<PluginType>().is_err());
    assert_eq!(PluginType::Transformers.to_string(), "transformers");
}

#[test]
fn transform_modes() {
    assert!(TransformMode::from("run").runs_transform());
    assert!(TransformMode::from("skip").runs_extract_load());
    assert!(!TransformMode::from("skip").runs_transform());

    let other = TransformMode::from("only");
    assert!(!other.runs_extract_load());
    assert_eq!(other.to_string(), "only");
}
