// tests/workitem_lifecycle.rs

use std::collections::BTreeSet;
use std::fs;
use std::sync::{Arc, Mutex};

use serde_json::json;
use tempfile::TempDir;

use wiqrunner::build_processor;
use wiqrunner::engine::{Transition, WorkitemProcessor};
use wiqrunner::errors::WorkerError;
use wiqrunner::exec::TaskRequest;
use wiqrunner::fs::{FileSystem, RealFileSystem};
use wiqrunner::payload;
use wiqrunner::queue::{MemoryQueueClient, QueueClient};
use wiqrunner::workitem::{ErrorType, Workitem, WorkitemState};
use wiqrunner_test_utils::builders::{config_in, WorkitemBuilder};
use wiqrunner_test_utils::fake_runner::{FakeRun, FakeTaskRunner};
use wiqrunner_test_utils::init_tracing;

const WIQ: &str = "robotframeworktest";

struct Harness {
    dir: TempDir,
    queue: Arc<MemoryQueueClient>,
    processor: WorkitemProcessor,
    requests: Arc<Mutex<Vec<TaskRequest>>>,
}

impl Harness {
    async fn new(configure: impl FnOnce(FakeTaskRunner) -> FakeTaskRunner) -> Self {
        Self::in_dir(TempDir::new().unwrap(), configure).await
    }

    async fn in_dir(
        dir: TempDir,
        configure: impl FnOnce(FakeTaskRunner) -> FakeTaskRunner,
    ) -> Self {
        init_tracing();
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let queue = Arc::new(MemoryQueueClient::new(Arc::clone(&fs)));
        queue.sign_in().await.unwrap();

        let runner = configure(FakeTaskRunner::new(Arc::clone(&fs)));
        let requests = runner.requests();
        let processor = build_processor(
            &config_in(dir.path()),
            Arc::clone(&queue) as Arc<dyn QueueClient>,
            fs,
            Arc::new(runner),
        );

        Self {
            dir,
            queue,
            processor,
            requests,
        }
    }

    /// Push `workitem`, pop it back and process it.
    async fn process(&self, workitem: Workitem) -> (Transition, Workitem) {
        let id = self.queue.push_workitem(WIQ, workitem);
        let popped = self.queue.pop_workitem(WIQ).await.unwrap().unwrap();
        let transition = self.processor.process(popped).await.unwrap();
        (transition, self.queue.record(&id).unwrap())
    }

    fn workdir_files(&self) -> BTreeSet<String> {
        fs::read_dir(self.dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}

#[tokio::test]
async fn url_is_passed_to_the_task_environment() {
    let h = Harness::new(|r| r).await;

    let (transition, record) = h
        .process(WorkitemBuilder::new("w1").payload(r#"{"url":"http://x"}"#).build())
        .await;

    assert_eq!(transition, Transition::Succeeded);
    assert_eq!(record.state, WorkitemState::Successful);
    assert_eq!(record.name, "Robot example completed");
    assert!(record.has_no_error());
    // The payload comes back with exactly the keys it went in with.
    let doc = payload::decode(&record.payload).unwrap();
    assert_eq!(doc.len(), 1);
    assert_eq!(doc.get("url"), Some(&json!("http://x")));

    let requests = h.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].env_var("url"), Some("http://x"));
    assert_eq!(requests[0].command, "robot example.robot");
    assert_eq!(requests[0].workdir, h.dir.path());
}

#[tokio::test]
async fn payload_without_url_sets_no_environment() {
    let h = Harness::new(|r| r).await;

    h.process(WorkitemBuilder::new("w1").payload(r#"{"other":1}"#).build())
        .await;

    let requests = h.requests.lock().unwrap();
    assert!(requests[0].env.is_empty());
}

#[tokio::test]
async fn non_zero_exit_becomes_application_retry() {
    let h = Harness::new(|r| r.with_default(FakeRun::exit(1).with_stderr("Keyword failed"))).await;

    let (transition, record) = h.process(WorkitemBuilder::new("w1").build()).await;

    assert_eq!(transition, Transition::Retryable);
    assert_eq!(record.state, WorkitemState::Retry);
    assert_eq!(record.errortype, Some(ErrorType::Application));
    let message = record.errormessage.unwrap();
    assert!(!message.is_empty());
    assert!(message.contains("exit code 1"));
    assert!(record.errorsource.unwrap().contains("Keyword failed"));
    assert_eq!(record.name, "Robot example completed");
}

#[tokio::test]
async fn spawn_failure_becomes_retry() {
    let h = Harness::new(|r| r.with_default(FakeRun::spawn_error("robot: not found"))).await;

    let (_, record) = h.process(WorkitemBuilder::new("w1").build()).await;

    assert_eq!(record.state, WorkitemState::Retry);
    assert!(record.errormessage.unwrap().contains("robot: not found"));
}

#[tokio::test]
async fn malformed_payload_retries_without_running_the_task() {
    let h = Harness::new(|r| r).await;

    let (transition, record) = h
        .process(WorkitemBuilder::new("w1").payload("{not json").build())
        .await;

    assert_eq!(transition, Transition::Retryable);
    assert_eq!(record.errortype, Some(ErrorType::Application));
    assert!(record.errormessage.unwrap().starts_with("Malformed payload"));
    assert!(h.requests.lock().unwrap().is_empty());
    assert_eq!(h.queue.update_calls(), 1);
}

#[tokio::test]
async fn missing_download_retries_without_running_the_task() {
    let h = Harness::new(|r| r).await;

    let (_, record) = h
        .process(
            WorkitemBuilder::new("w1")
                .remote_file("input.xlsx", "does-not-exist")
                .build(),
        )
        .await;

    assert_eq!(record.state, WorkitemState::Retry);
    assert!(record.errormessage.unwrap().contains("does-not-exist"));
    assert!(h.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn outbound_files_are_uploaded_and_removed_on_both_paths() {
    let outputs = |run: FakeRun| {
        run.writing("output.xml", b"<robot/>")
            .writing("log.html", b"<html/>")
    };

    let ok = Harness::new(|r| r.with_default(outputs(FakeRun::exit(0)))).await;
    let failed = Harness::new(|r| r.with_default(outputs(FakeRun::exit(1)))).await;
    for h in [&ok, &failed] {
        fs::write(h.dir.path().join("example.robot"), b"suite").unwrap();
    }

    let (ok_transition, _) = ok.process(WorkitemBuilder::new("w1").build()).await;
    let (failed_transition, _) = failed.process(WorkitemBuilder::new("w1").build()).await;
    assert_eq!(ok_transition, Transition::Succeeded);
    assert_eq!(failed_transition, Transition::Retryable);

    let uploaded = |h: &Harness| -> BTreeSet<String> {
        let updates = h.queue.updates();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].done);
        updates[0].files.iter().cloned().collect()
    };
    let expected: BTreeSet<String> = ["log.html", "output.xml"].iter().map(|s| s.to_string()).collect();
    assert_eq!(uploaded(&ok), expected);
    assert_eq!(uploaded(&failed), expected);

    for h in [&ok, &failed] {
        assert_eq!(h.workdir_files(), BTreeSet::from(["example.robot".to_string()]));
    }
}

#[tokio::test]
async fn uploaded_content_is_attached_to_the_workitem() {
    let h = Harness::new(|r| r.with_default(FakeRun::exit(0).writing("result.txt", b"42"))).await;

    let (_, record) = h.process(WorkitemBuilder::new("w1").build()).await;

    let attachment = record
        .files
        .iter()
        .find(|f| f.filename == "result.txt")
        .expect("result.txt attached");
    assert_eq!(attachment.file.as_deref(), Some(&b"42"[..]));
    assert!(!attachment.compressed);
}

#[tokio::test]
async fn inbound_files_are_returned_and_cleaned_up() {
    let h = Harness::new(|r| r).await;
    h.queue.store_file("file-9", b"remote data".to_vec());

    let (_, record) = h
        .process(
            WorkitemBuilder::new("w1")
                .compressed_file("data.csv", b"a,b\n1,2\n")
                .remote_file("extra.bin", "file-9")
                .build(),
        )
        .await;

    let uploaded: BTreeSet<String> = h.queue.updates()[0].files.iter().cloned().collect();
    assert_eq!(
        uploaded,
        BTreeSet::from(["data.csv".to_string(), "extra.bin".to_string()])
    );
    let data = record.files.iter().rev().find(|f| f.filename == "data.csv").unwrap();
    assert_eq!(data.file.as_deref(), Some(&b"a,b\n1,2\n"[..]));
    assert!(h.workdir_files().is_empty());
}

#[tokio::test]
async fn update_transport_failure_propagates_and_keeps_files() {
    let h = Harness::new(|r| r.with_default(FakeRun::exit(0).writing("out.txt", b"x"))).await;
    h.queue.push_workitem(WIQ, WorkitemBuilder::new("w1").build());
    let popped = h.queue.pop_workitem(WIQ).await.unwrap().unwrap();
    h.queue.fail_next_updates(1);

    let result = h.processor.process(popped).await;

    assert!(matches!(result, Err(WorkerError::Transport(_))));
    assert_eq!(h.workdir_files(), BTreeSet::from(["out.txt".to_string()]));
}

#[tokio::test]
async fn inbound_filenames_cannot_leave_the_workdir() {
    let outer = TempDir::new().unwrap();
    let h = Harness::in_dir(TempDir::new_in(outer.path()).unwrap(), |r| r).await;

    let (transition, record) = h
        .process(
            WorkitemBuilder::new("w1")
                .inline_file("sub/in.txt", b"nested")
                .inline_file("../escape.txt", b"outside")
                .build(),
        )
        .await;

    assert_eq!(transition, Transition::Retryable);
    assert_eq!(record.errortype, Some(ErrorType::Application));
    assert!(record.errormessage.unwrap().starts_with("File staging error"));
    assert!(h.requests.lock().unwrap().is_empty());
    assert!(h.workdir_files().is_empty());
    assert!(!outer.path().join("escape.txt").exists());
}

#[tokio::test]
async fn non_string_url_retries_without_running_the_task() {
    let h = Harness::new(|r| r).await;

    let (transition, record) = h
        .process(WorkitemBuilder::new("w1").payload(r#"{"url":null}"#).build())
        .await;

    assert_eq!(transition, Transition::Retryable);
    assert_eq!(record.state, WorkitemState::Retry);
    assert_eq!(record.errortype, Some(ErrorType::Application));
    assert!(record.errormessage.unwrap().contains("url must be a string"));
    assert!(h.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn redelivered_outputs_replace_earlier_attachments() {
    let h = Harness::new(|r| {
        r.then(FakeRun::exit(1).writing("output.xml", b"first"))
            .then(FakeRun::exit(0).writing("output.xml", b"second"))
    })
    .await;

    let (_, first) = h.process(WorkitemBuilder::new("w1").build()).await;
    assert_eq!(h.queue.requeue_retries(), 1);
    let redelivered = h.queue.pop_workitem(WIQ).await.unwrap().unwrap();
    assert_eq!(redelivered.files.len(), first.files.len());
    h.processor.process(redelivered).await.unwrap();

    let record = h.queue.record("w1").unwrap();
    assert_eq!(record.state, WorkitemState::Successful);
    let outputs: Vec<_> = record
        .files
        .iter()
        .filter(|f| f.filename == "output.xml")
        .collect();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].file.as_deref(), Some(&b"second"[..]));
}
