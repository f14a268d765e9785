// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::report::RecordingReporter;
use crate::sync::FakeSync;
use std::time::Duration;
use yg_adapters::{FakeCloudAdapter, FakeTransport};

struct Setup {
    cloud: FakeCloudAdapter,
    transport: FakeTransport,
    sync: FakeSync,
    store: ProjectStore,
    reporter: RecordingReporter,
    project: Project,
    _dir: tempfile::TempDir,
}

fn setup(config: &Config) -> (Setup, PipelineUnderTest) {
    let dir = tempfile::tempdir().unwrap();
    let project = Project::from_path("/home/dev/widget");
    let store = ProjectStore::open(dir.path(), &project.hash).unwrap();
    let cloud = FakeCloudAdapter::default();
    let transport = FakeTransport::new();
    let sync = FakeSync::new();
    let reporter = RecordingReporter::new();

    let connect: Box<dyn Fn(&VmInfo) -> FakeTransport + Send + Sync> = Box::new({
        let transport = transport.clone();
        move |_| transport.clone()
    });
    let pipeline = Pipeline::new(
        cloud.clone(),
        connect,
        sync.clone(),
        store.clone(),
        project.clone(),
        config.clone(),
        Arc::new(reporter.clone()),
    )
    .with_readiness(ReadinessConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
        probe_timeout: Duration::from_millis(10),
    });

    (
        Setup {
            cloud,
            transport,
            sync,
            store,
            reporter,
            project,
            _dir: dir,
        },
        pipeline,
    )
}

type PipelineUnderTest = Pipeline<
    FakeCloudAdapter,
    FakeTransport,
    Box<dyn Fn(&VmInfo) -> FakeTransport + Send + Sync>,
    FakeSync,
>;

#[tokio::test]
async fn first_run_provisions_streams_and_records() {
    let (s, pipeline) = setup(&Config::default());
    s.transport.set_stream(&[b"hello\n"], 0);
    s.transport.on_exec_stdout("cat /tmp/yg-exit", "0\n");

    let outcome = pipeline
        .run("echo hello", &CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.detached);
    assert_eq!(outcome.exit_code, 0);
    // The generated id is itself valid.
    assert!(RunId::parse(outcome.run_id.as_str()).is_ok());

    // A VM was created and recorded.
    assert!(s.store.load_vm().is_ok());
    // The tree was synced to the VM's project directory.
    assert_eq!(s.sync.targets(), vec!["ubuntu@10.0.0.1:/home/ubuntu/project"]);

    // History and last-run agree (one entry, exit 0).
    let history = s.store.load_history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].exit_code, 0);
    assert_eq!(s.store.load_last_run().unwrap(), history[0].run_id);
    assert_eq!(history[0].run_id, outcome.run_id);

    // Outputs were uploaded, streamed output included.
    let prefix = format!("{}/{}", s.project.display_name, outcome.run_id);
    assert_eq!(
        s.cloud.object(&format!("{}/stdout.log", prefix)).unwrap(),
        b"hello\n"
    );
    assert_eq!(
        s.cloud.object(&format!("{}/exit_code", prefix)).unwrap(),
        b"0"
    );
    assert!(s.reporter.contains("stream: hello"));
}

#[tokio::test]
async fn remote_exit_code_becomes_the_outcome() {
    let (s, pipeline) = setup(&Config::default());
    s.transport.on_exec_stdout("cat /tmp/yg-exit", "7\n");

    let outcome = pipeline
        .run("false-ish", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.exit_code, 7);
    let history = s.store.load_history().unwrap();
    assert_eq!(history[0].exit_code, 7);
    let prefix = format!("{}/{}", s.project.display_name, outcome.run_id);
    assert_eq!(
        s.cloud.object(&format!("{}/exit_code", prefix)).unwrap(),
        b"7"
    );
}

#[tokio::test]
async fn cancellation_during_the_run_detaches() {
    let (s, pipeline) = setup(&Config::default());
    s.transport.set_stream(&[b"partial output\n"], 0);
    s.transport.hold_stream_open();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let outcome = pipeline.run("sleep 600", &cancel).await.unwrap();

    assert!(outcome.detached);
    assert_eq!(outcome.exit_code, 0);
    assert!(s.reporter.contains("detached"));

    // The run id is recorded so logs/kill can find the session...
    assert_eq!(s.store.load_last_run().unwrap(), outcome.run_id);
    // ...but nothing was uploaded and no history was written.
    assert!(s.store.load_history().unwrap().is_empty());
    assert!(s.cloud.object_keys().is_empty());
}

#[tokio::test]
async fn cancellation_before_the_run_is_an_error() {
    let (s, pipeline) = setup(&Config::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = pipeline.run("echo hello", &cancel).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Orchestrator(OrchestratorError::Cancelled)
    ));
    assert!(s.store.load_last_run().is_err());
}

#[tokio::test]
async fn sync_failure_fails_the_invocation() {
    let (s, pipeline) = setup(&Config::default());
    s.sync.fail_with("rsync: connection unexpectedly closed");

    let err = pipeline
        .run("echo hello", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Sync(_)));
    assert!(s.store.load_last_run().is_err());
}

#[tokio::test]
async fn classified_cloud_errors_are_rendered_once() {
    let (s, pipeline) = setup(&Config::default());
    s.cloud
        .fail_create_with("Unable to locate credentials. You can configure credentials by running \"aws configure\".");

    let err = pipeline
        .run("echo hello", &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_displayed());
    assert!(s.reporter.contains("no cloud credentials"));
    assert!(s.reporter.contains("fix:"));
}

#[tokio::test]
async fn active_sessions_suppress_the_idle_supervisor() {
    let config = Config {
        grace_period: Some(Duration::from_secs(60)),
        ..Config::default()
    };
    let (s, pipeline) = setup(&config);
    s.transport.on_exec_stdout("cat /tmp/yg-exit", "0\n");
    // Another run is still live on the VM.
    s.transport
        .on_exec_stdout("list-sessions", "===TMUX:deadbeef\nmake watch\n");

    pipeline
        .run("echo hello", &CancellationToken::new())
        .await
        .unwrap();

    // No daemon was spawned for this project.
    assert_eq!(s.store.load_monitor_pid().unwrap(), None);
    assert_eq!(s.store.load_idle_start().unwrap(), None);
}

#[tokio::test]
async fn missing_grace_period_never_spawns_a_supervisor() {
    let (s, pipeline) = setup(&Config::default());
    s.transport.on_exec_stdout("cat /tmp/yg-exit", "0\n");

    pipeline
        .run("echo hello", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(s.store.load_monitor_pid().unwrap(), None);
    assert_eq!(s.store.load_idle_start().unwrap(), None);
}

#[tokio::test]
async fn configured_artifacts_are_fetched_and_validated() {
    let config = Config {
        artifacts: vec!["out/a.txt".to_string(), "../escape".to_string()],
        ..Config::default()
    };
    let (s, pipeline) = setup(&config);
    s.transport.on_exec_stdout("cat /tmp/yg-exit", "0\n");
    s.transport.on_exec_stdout("out/a.txt", "artifact body");

    let outcome = pipeline
        .run("make artifacts", &CancellationToken::new())
        .await
        .unwrap();

    let key = format!(
        "{}/{}/artifacts/out/a.txt",
        s.project.display_name, outcome.run_id
    );
    assert_eq!(s.cloud.object(&key).unwrap(), b"artifact body");
    assert!(s.reporter.contains("escapes artifacts directory"));
    assert_eq!(outcome.exit_code, 0);
}
