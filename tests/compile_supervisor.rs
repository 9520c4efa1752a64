// tests/compile_supervisor.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::event::{AccessKind, CreateKind, ModifyKind};
use notify::{Event, EventKind};
use tempfile::TempDir;

use pipeworker::compiler::Compiler;
use pipeworker::errors::WorkerError;
use pipeworker::workers::{AutoCompile, BackgroundCompiler, CompileEventFilter, CompileEventHandler};
use pipeworker_test_utils::builders::{ProjectConfigBuilder, project_in};
use pipeworker_test_utils::fakes::RecordingCompiler;
use pipeworker_test_utils::{init_tracing, with_timeout};

fn modify(path: &str) -> Event {
    Event::new(EventKind::Modify(ModifyKind::Any)).add_path(PathBuf::from(path))
}

fn handler(compiler: &Arc<RecordingCompiler>, ignores: &[String]) -> CompileEventHandler {
    CompileEventHandler::new(
        Arc::clone(compiler) as Arc<dyn Compiler>,
        CompileEventFilter::new(ignores),
    )
}

#[tokio::test]
async fn each_model_change_triggers_one_compile() {
    with_timeout(async {
        init_tracing();

        let compiler = Arc::new(RecordingCompiler::new());
        let handler = handler(&compiler, &[]);

        assert!(handler.on_event(modify("/p/model/orders.m5o")).await);
        assert!(
            handler
                .on_event(Event::new(EventKind::Create(CreateKind::File)).add_path("/p/model/new.m5o".into()))
                .await
        );

        assert_eq!(compiler.calls(), 2);
    })
    .await
}

#[tokio::test]
async fn compiled_artifacts_never_trigger_a_compile() {
    with_timeout(async {
        init_tracing();

        let compiler = Arc::new(RecordingCompiler::new());
        let handler = handler(&compiler, &[]);

        assert!(!handler.on_event(modify("/p/model/orders.m5oc")).await);
        assert!(!handler.on_event(modify("/p/model/nested/topics.m5oc")).await);

        assert_eq!(compiler.calls(), 0);
    })
    .await
}

#[tokio::test]
async fn event_with_one_source_path_among_artifacts_compiles() {
    with_timeout(async {
        let compiler = Arc::new(RecordingCompiler::new());
        let handler = handler(&compiler, &[]);

        let event = modify("/p/model/orders.m5oc").add_path(PathBuf::from("/p/model/orders.m5o"));
        assert!(handler.on_event(event).await);
        assert_eq!(compiler.calls(), 1);
    })
    .await
}

#[tokio::test]
async fn access_events_and_extra_ignores_are_filtered() {
    with_timeout(async {
        let compiler = Arc::new(RecordingCompiler::new());
        let handler = handler(&compiler, &["**/*.swp".to_string()]);

        let read = Event::new(EventKind::Access(AccessKind::Read)).add_path("/p/model/a.m5o".into());
        assert!(!handler.on_event(read).await);
        assert!(!handler.on_event(modify("/p/model/.a.m5o.swp")).await);

        assert_eq!(compiler.calls(), 0);
    })
    .await
}

#[test]
fn pathless_events_compile() {
    let filter = CompileEventFilter::default();
    assert!(filter.should_compile(&Event::new(EventKind::Any)));
}

#[tokio::test]
async fn compile_failure_is_logged_and_later_changes_still_compile() {
    with_timeout(async {
        init_tracing();

        let compiler = Arc::new(RecordingCompiler::failing_first(1));
        let handler = handler(&compiler, &[]);

        // First compile fails; the handler must swallow it.
        assert!(handler.on_event(modify("/p/model/broken.m5o")).await);
        assert!(handler.on_event(modify("/p/model/fixed.m5o")).await);

        assert_eq!(compiler.calls(), 2);
    })
    .await
}

#[tokio::test]
async fn missing_model_dir_disables_auto_compile_without_failing() {
    with_timeout(async {
        init_tracing();

        let dir = TempDir::new().unwrap();
        let config = ProjectConfigBuilder::new().model_dir("does-not-exist").build();
        let project = project_in(dir.path(), config);
        let compiler = Arc::new(RecordingCompiler::new());

        let mut worker = BackgroundCompiler::new(project, Some(compiler.clone() as Arc<dyn Compiler>));
        match worker.start() {
            AutoCompile::Disabled(WorkerError::WatchStartFailed { path, .. }) => {
                assert!(path.ends_with("does-not-exist"));
            }
            other => panic!("expected disabled auto-compile, got {other:?}"),
        }

        assert!(!worker.is_running());
        // Stopping a worker that never started is fine.
        worker.stop();
        assert_eq!(compiler.calls(), 0);
    })
    .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn writing_a_model_file_triggers_a_compile() {
    with_timeout(async {
        init_tracing();

        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("model")).unwrap();
        let project = project_in(dir.path(), ProjectConfigBuilder::new().build());
        let compiler = Arc::new(RecordingCompiler::new());

        let mut worker =
            BackgroundCompiler::new(project, Some(compiler.clone() as Arc<dyn Compiler>));
        assert!(worker.start().is_enabled());
        assert!(worker.is_running());

        std::fs::write(dir.path().join("model/orders.m5o"), "{}").unwrap();

        assert!(
            compiler.wait_for_calls(1, Duration::from_secs(3)).await,
            "model change did not trigger a compile"
        );

        worker.stop();
        assert!(!worker.is_running());
    })
    .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn writing_only_compiled_artifacts_does_not_compile() {
    with_timeout(async {
        init_tracing();

        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("model")).unwrap();
        let project = project_in(dir.path(), ProjectConfigBuilder::new().build());
        let compiler = Arc::new(RecordingCompiler::new());

        let mut worker =
            BackgroundCompiler::new(project, Some(compiler.clone() as Arc<dyn Compiler>));
        assert!(worker.start().is_enabled());

        std::fs::write(dir.path().join("model/orders.m5oc"), "{}").unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(compiler.calls(), 0);
        worker.stop();
    })
    .await
}
