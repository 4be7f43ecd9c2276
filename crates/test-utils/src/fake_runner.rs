use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use wiqrunner::errors::{Result, WorkerError};
use wiqrunner::exec::{TaskExit, TaskRequest, TaskRunner};
use wiqrunner::fs::FileSystem;
use wiqrunner::queue::BoxFuture;

/// What the fake task does on one run.
#[derive(Debug, Clone, Default)]
pub struct FakeRun {
    pub exit_code: i32,
    /// Files written into the request's workdir before "exiting".
    pub writes: Vec<(String, Vec<u8>)>,
    pub stderr: Vec<String>,
    /// Return `Err` instead of an exit status (spawn failure).
    pub spawn_error: Option<String>,
}

impl FakeRun {
    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Self::default()
        }
    }

    pub fn spawn_error(msg: &str) -> Self {
        Self {
            spawn_error: Some(msg.to_string()),
            ..Self::default()
        }
    }

    pub fn writing(mut self, name: &str, content: &[u8]) -> Self {
        self.writes.push((name.to_string(), content.to_vec()));
        self
    }

    pub fn with_stderr(mut self, line: &str) -> Self {
        self.stderr.push(line.to_string());
        self
    }
}

/// A fake task runner that:
/// - records every request (command, workdir, env)
/// - plays back scripted runs in order, then repeats `default_run`
pub struct FakeTaskRunner {
    fs: Arc<dyn FileSystem>,
    script: Mutex<VecDeque<FakeRun>>,
    default_run: FakeRun,
    requests: Arc<Mutex<Vec<TaskRequest>>>,
}

impl FakeTaskRunner {
    /// Runner that always exits 0 without writing anything.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            script: Mutex::new(VecDeque::new()),
            default_run: FakeRun::default(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_default(mut self, run: FakeRun) -> Self {
        self.default_run = run;
        self
    }

    pub fn then(self, run: FakeRun) -> Self {
        self.script.lock().unwrap().push_back(run);
        self
    }

    /// Shared handle on the recorded requests.
    pub fn requests(&self) -> Arc<Mutex<Vec<TaskRequest>>> {
        Arc::clone(&self.requests)
    }
}

impl TaskRunner for FakeTaskRunner {
    fn run(&self, request: TaskRequest) -> BoxFuture<'_, Result<TaskExit>> {
        Box::pin(async move {
            let run = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.default_run.clone());

            {
                let mut guard = self.requests.lock().unwrap();
                guard.push(request.clone());
            }

            if let Some(msg) = run.spawn_error {
                return Err(WorkerError::TaskExecution(msg));
            }

            for (name, content) in &run.writes {
                self.fs.write(&request.workdir.join(name), content)?;
            }

            Ok(TaskExit {
                code: run.exit_code,
                stderr_tail: run.stderr,
            })
        })
    }
}
