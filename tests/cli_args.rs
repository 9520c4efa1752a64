// tests/cli_args.rs

use clap::Parser;

use pipeworker::cli::{CliArgs, Command};
use pipeworker::logging::parse_level_str;

#[test]
fn elt_subcommand_parses_positionals_and_flags() {
    let args = CliArgs::try_parse_from([
        "pipeworker",
        "--project",
        "/srv/analytics",
        "elt",
        "tap-gitlab",
        "target-postgres",
        "--transform",
        "run",
        "--schedule",
        "nightly",
    ])
    .unwrap();

    assert_eq!(args.project, std::path::PathBuf::from("/srv/analytics"));
    match args.command {
        Command::Elt {
            extractor,
            loader,
            transform,
            schedule,
        } => {
            assert_eq!(extractor, "tap-gitlab");
            assert_eq!(loader, "target-postgres");
            assert_eq!(transform.as_deref(), Some("run"));
            assert_eq!(schedule.as_deref(), Some("nightly"));
        }
        other => panic!("expected elt command, got {other:?}"),
    }
}

#[test]
fn global_flags_work_after_the_subcommand() {
    let args = CliArgs::try_parse_from(["pipeworker", "up", "--dry-run", "--log-level", "debug"]).unwrap();

    assert!(args.dry_run);
    assert!(args.log_level.is_some());
    assert_eq!(args.project, std::path::PathBuf::from("."));
    assert!(matches!(
        args.command,
        Command::Up {
            no_orchestrator: false,
            open_browser: false
        }
    ));
}

#[test]
fn wait_ui_accepts_url_and_attempt_limit() {
    let args = CliArgs::try_parse_from([
        "pipeworker",
        "wait-ui",
        "--url",
        "http://localhost:8080",
        "--open-browser",
        "--max-attempts",
        "5",
    ])
    .unwrap();

    match args.command {
        Command::WaitUi {
            url,
            open_browser,
            max_attempts,
        } => {
            assert_eq!(url.as_deref(), Some("http://localhost:8080"));
            assert!(open_browser);
            assert_eq!(max_attempts, Some(5));
        }
        other => panic!("expected wait-ui command, got {other:?}"),
    }
}

#[test]
fn missing_subcommand_is_an_error() {
    assert!(CliArgs::try_parse_from(["pipeworker"]).is_err());
}

#[test]
fn log_level_strings() {
    assert_eq!(parse_level_str(" Warning "), Some(tracing::Level::WARN));
    assert_eq!(parse_level_str("trace"), Some(tracing::Level::TRACE));
    assert_eq!(parse_level_str("loud"), None);
}
