// tests/elt_worker.rs

use std::error::Error as _;

use chrono::{Local, NaiveDateTime, TimeZone};
use proptest::prelude::*;
use regex::Regex;
use tempfile::TempDir;

use pipeworker::errors::WorkerError;
use pipeworker::types::{PluginType, TransformMode};
use pipeworker::workers::elt::{JOB_ID_TIME_FORMAT, UNNAMED_SCHEDULE};
use pipeworker::workers::{EltWorker, SchedulePayload, job_id};
use pipeworker_test_utils::builders::{ProjectConfigBuilder, payload, project_in};
use pipeworker_test_utils::fakes::{RecordingRunners, RunnerCall};
use pipeworker_test_utils::{init_tracing, with_timeout};

fn extract_load(extractor: &str, loader: &str) -> RunnerCall {
    RunnerCall::ExtractLoad {
        extractor: extractor.to_string(),
        loader: loader.to_string(),
    }
}

fn transform(extractor: &str, loader: &str) -> RunnerCall {
    RunnerCall::Transform {
        extractor: extractor.to_string(),
        loader: loader.to_string(),
        models: extractor.to_string(),
    }
}

fn worker(dir: &TempDir, payload: SchedulePayload, runners: &std::sync::Arc<RecordingRunners>) -> EltWorker {
    let project = project_in(dir.path(), ProjectConfigBuilder::new().build());
    EltWorker::new(project, payload, RecordingRunners::runners(runners))
}

#[tokio::test]
async fn transform_run_extracts_loads_then_transforms_extractor_models() {
    with_timeout(async {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let runners = RecordingRunners::new();
        let worker = worker(
            &dir,
            payload("tap-gitlab", "target-postgres", Some("run"), Some("nightly")),
            &runners,
        );

        assert!(!worker.is_complete());
        worker.run().await.unwrap();

        assert_eq!(
            runners.calls(),
            vec![
                extract_load("tap-gitlab", "target-postgres"),
                transform("tap-gitlab", "target-postgres"),
            ]
        );
        assert!(worker.is_complete());
    })
    .await
}

#[tokio::test]
async fn transform_skip_only_extracts_and_loads() {
    with_timeout(async {
        let dir = TempDir::new().unwrap();
        let runners = RecordingRunners::new();
        let worker = worker(&dir, payload("tap-csv", "target-sqlite", Some("skip"), None), &runners);

        worker.run().await.unwrap();

        assert_eq!(runners.calls(), vec![extract_load("tap-csv", "target-sqlite")]);
        assert!(worker.is_complete());
    })
    .await
}

#[tokio::test]
async fn absent_or_unknown_transform_runs_nothing() {
    with_timeout(async {
        init_tracing();
        for mode in [None, Some("only"), Some("RUN")] {
            let dir = TempDir::new().unwrap();
            let runners = RecordingRunners::new();
            let worker = worker(&dir, payload("tap-csv", "target-sqlite", mode, None), &runners);

            worker.run().await.unwrap();

            assert!(runners.calls().is_empty(), "mode {mode:?} ran stages");
            assert!(worker.is_complete());
        }
    })
    .await
}

#[tokio::test]
async fn extract_load_failure_skips_transform_and_still_completes() {
    with_timeout(async {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let runners = RecordingRunners::failing_extract_load();
        let worker = worker(&dir, payload("tap-gitlab", "target-postgres", Some("run"), None), &runners);

        let err = worker.run().await.unwrap_err();

        assert!(err.is_elt_failure());
        assert!(err.to_string().starts_with("ELT could not complete"));
        match &err {
            WorkerError::ExtractLoadFailed { job_id, .. } => assert_eq!(job_id, worker.job_id()),
            other => panic!("expected extract-load failure, got {other:?}"),
        }
        assert!(err.source().unwrap().to_string().contains("tap-gitlab"));
        assert_eq!(runners.calls(), vec![extract_load("tap-gitlab", "target-postgres")]);
        assert!(worker.is_complete());
    })
    .await
}

#[tokio::test]
async fn transform_failure_is_reported_as_elt_failure() {
    with_timeout(async {
        let dir = TempDir::new().unwrap();
        let runners = RecordingRunners::failing_transform();
        let worker = worker(&dir, payload("tap-gitlab", "target-postgres", Some("run"), None), &runners);

        let err = worker.run().await.unwrap_err();

        assert!(matches!(err, WorkerError::TransformFailed { .. }));
        assert!(err.to_string().starts_with("ELT could not complete"));
        assert!(worker.is_complete());
    })
    .await
}

#[tokio::test]
async fn stages_receive_job_scoped_context() {
    with_timeout(async {
        let dir = TempDir::new().unwrap();
        let runners = RecordingRunners::new();
        let worker = worker(&dir, payload("tap-gitlab", "target-postgres", Some("skip"), None), &runners);

        worker.run().await.unwrap();

        let contexts = runners.contexts();
        assert_eq!(contexts.len(), 1);
        let ctx = &contexts[0];
        assert_eq!(ctx.job_id, worker.job_id());
        assert_eq!(
            ctx.loader_config_dir,
            dir.path().join(".pipeworker").join(PluginType::Loaders.as_str()).join("target-postgres")
        );
        assert_eq!(
            ctx.extractor_config_dir,
            dir.path().join(".pipeworker/extractors/tap-gitlab")
        );
    })
    .await
}

#[tokio::test]
async fn spawned_job_reports_completion_through_handle() {
    with_timeout(async {
        let dir = TempDir::new().unwrap();
        let runners = RecordingRunners::new();
        let worker = worker(&dir, payload("tap-csv", "target-sqlite", Some("run"), Some("hourly")), &runners);
        let expected_id = worker.job_id().to_string();

        let handle = worker.spawn();
        assert_eq!(handle.job_id(), expected_id);

        let result = handle.join().await.expect("job task panicked");
        assert!(result.is_ok());
        assert_eq!(runners.calls().len(), 2);
    })
    .await
}

#[test]
fn job_id_has_schedule_and_microsecond_timestamp() {
    let at = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).single().unwrap()
        + chrono::Duration::microseconds(42);

    assert_eq!(job_id("nightly", at), "job_nightly_20240305-14:07:09.000042");
}

#[test]
fn worker_job_id_uses_unnamed_without_schedule_name() {
    let dir = TempDir::new().unwrap();
    let runners = RecordingRunners::new();
    let worker = worker(&dir, payload("tap-csv", "target-sqlite", Some("run"), None), &runners);

    let re = Regex::new(&format!(
        r"^job_{UNNAMED_SCHEDULE}_\d{{8}}-\d{{2}}:\d{{2}}:\d{{2}}\.\d{{6}}$"
    ))
    .unwrap();
    assert!(re.is_match(worker.job_id()), "bad job id {}", worker.job_id());
}

#[test]
fn workers_for_the_same_schedule_get_distinct_job_ids() {
    let dir = TempDir::new().unwrap();
    let runners = RecordingRunners::new();
    let first = worker(&dir, payload("tap-csv", "target-sqlite", None, Some("hourly")), &runners);
    std::thread::sleep(std::time::Duration::from_millis(2));
    let second = worker(&dir, payload("tap-csv", "target-sqlite", None, Some("hourly")), &runners);

    assert!(first.job_id().starts_with("job_hourly_"));
    assert!(second.job_id().starts_with("job_hourly_"));
    assert_ne!(first.job_id(), second.job_id());
}

#[test]
fn payload_deserializes_with_optional_fields() {
    let payload: SchedulePayload = toml::from_str(
        r#"
extractor = "tap-gitlab"
loader = "target-postgres"
transform = "skip"
"#,
    )
    .unwrap();

    assert_eq!(payload.transform, Some(TransformMode::Skip));
    assert_eq!(payload.schedule_name(), UNNAMED_SCHEDULE);

    let payload: SchedulePayload =
        toml::from_str("extractor = \"a\"\nloader = \"b\"\ntransform = \"later\"\nname = \"n\"").unwrap();
    assert_eq!(payload.transform, Some(TransformMode::Other("later".to_string())));
    assert_eq!(payload.schedule_name(), "n");
}

proptest! {
    #[test]
    fn job_id_round_trips_its_timestamp(
        name in "[a-z][a-z0-9-]{0,15}",
        secs in 0i64..4_000_000_000,
        micros in 0u32..1_000_000,
    ) {
        let at = Local.timestamp_opt(secs, micros * 1_000).single().unwrap();
        let id = job_id(&name, at);

        let prefix = format!("job_{name}_");
        prop_assert!(id.starts_with(&prefix));

        let stamp = &id[prefix.len()..];
        let re = Regex::new(r"^\d{8}-\d{2}:\d{2}:\d{2}\.\d{6}$").unwrap();
        prop_assert!(re.is_match(stamp), "bad timestamp {}", stamp);

        let parsed = NaiveDateTime::parse_from_str(stamp, JOB_ID_TIME_FORMAT).unwrap();
        prop_assert_eq!(parsed, at.naive_local());
    }
}
