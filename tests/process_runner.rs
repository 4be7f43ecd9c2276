// tests/process_runner.rs

#![cfg(unix)]

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use wiqrunner::build_processor;
use wiqrunner::config::{ConfigFile, RawConfigFile};
use wiqrunner::exec::{ProcessTaskRunner, TaskRequest, TaskRunner};
use wiqrunner::fs::{FileSystem, RealFileSystem};
use wiqrunner::queue::{MemoryQueueClient, QueueClient};
use wiqrunner::workitem::WorkitemState;
use wiqrunner_test_utils::builders::WorkitemBuilder;
use wiqrunner_test_utils::{init_tracing, with_timeout};

fn request(dir: &TempDir, command: &str, env: &[(&str, &str)]) -> TaskRequest {
    TaskRequest {
        command: command.to_string(),
        workdir: dir.path().to_path_buf(),
        env: env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

#[tokio::test]
async fn exit_code_is_reported() {
    init_tracing();
    let dir = TempDir::new().unwrap();

    let exit = with_timeout(ProcessTaskRunner::new().run(request(&dir, "exit 3", &[])))
        .await
        .unwrap();

    assert_eq!(exit.code, 3);
    assert!(!exit.success());
}

#[tokio::test]
async fn task_runs_in_workdir_with_injected_env() {
    let dir = TempDir::new().unwrap();

    let exit = with_timeout(ProcessTaskRunner::new().run(request(
        &dir,
        "printf '%s' \"$url\" > url.txt",
        &[("url", "http://x")],
    )))
    .await
    .unwrap();

    assert!(exit.success());
    assert_eq!(fs::read_to_string(dir.path().join("url.txt")).unwrap(), "http://x");
}

#[tokio::test]
async fn stderr_tail_is_captured() {
    let dir = TempDir::new().unwrap();

    let exit = with_timeout(ProcessTaskRunner::new().run(request(
        &dir,
        "echo starting; echo first >&2; echo boom >&2; exit 1",
        &[],
    )))
    .await
    .unwrap();

    assert_eq!(exit.code, 1);
    assert_eq!(exit.stderr_tail, vec!["first".to_string(), "boom".to_string()]);
}

#[tokio::test]
async fn missing_workdir_is_a_spawn_error() {
    let dir = TempDir::new().unwrap();
    let mut req = request(&dir, "true", &[]);
    req.workdir = dir.path().join("does-not-exist");

    assert!(ProcessTaskRunner::new().run(req).await.is_err());
}

#[tokio::test]
async fn real_task_output_is_attached_and_removed() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let mut raw = RawConfigFile::default();
    raw.task.workdir = dir.path().to_path_buf();
    raw.task.cmd = "printf '%s' \"$url\" > visited.txt".to_string();
    let cfg = ConfigFile::try_from(raw).unwrap();

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let queue = Arc::new(MemoryQueueClient::new(Arc::clone(&fs)));
    queue.sign_in().await.unwrap();
    let processor = build_processor(
        &cfg,
        Arc::clone(&queue) as Arc<dyn QueueClient>,
        fs,
        Arc::new(ProcessTaskRunner::new()),
    );

    let id = queue.push_workitem(
        cfg.wiq(),
        WorkitemBuilder::new("w1").payload(r#"{"url":"http://x"}"#).build(),
    );
    let summary = with_timeout(wiqrunner::engine::drain(&processor, cfg.wiq()))
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    let record = queue.record(&id).unwrap();
    assert_eq!(record.state, WorkitemState::Successful);
    let visited = record.files.iter().find(|f| f.filename == "visited.txt").unwrap();
    assert_eq!(visited.file.as_deref(), Some(&b"http://x"[..]));
    assert!(!dir.path().join("visited.txt").exists());
}
