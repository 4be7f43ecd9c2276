// tests/runtime_modes.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use wiqrunner::build_processor;
use wiqrunner::config::DriveMode;
use wiqrunner::engine::{Runtime, RuntimeEvent, RuntimeOptions};
use wiqrunner::fs::mock::MockFileSystem;
use wiqrunner::fs::FileSystem;
use wiqrunner::queue::{MemoryQueueClient, QueueClient};
use wiqrunner::workitem::WorkitemState;
use wiqrunner_test_utils::builders::{config_in, WorkitemBuilder};
use wiqrunner_test_utils::fake_runner::FakeTaskRunner;
use wiqrunner_test_utils::{init_tracing, with_timeout};

const WIQ: &str = "robotframeworktest";

fn runtime(
    mode: DriveMode,
    once: bool,
) -> (Arc<MemoryQueueClient>, Runtime, mpsc::Sender<RuntimeEvent>) {
    init_tracing();
    let fs: Arc<dyn FileSystem> = Arc::new(MockFileSystem::new());
    let queue = Arc::new(MemoryQueueClient::new(Arc::clone(&fs)));
    let runner = FakeTaskRunner::new(Arc::clone(&fs));
    let processor = build_processor(
        &config_in(std::path::Path::new(".")),
        Arc::clone(&queue) as Arc<dyn QueueClient>,
        fs,
        Arc::new(runner),
    );

    let (tx, rx) = mpsc::channel(4);
    let runtime = Runtime::new(Arc::new(processor), WIQ, mode, RuntimeOptions { once }, rx);
    (queue, runtime, tx)
}

/// Poll `cond` every few milliseconds until it holds.
async fn wait_until(cond: impl Fn() -> bool) {
    while !cond() {
        sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn once_mode_drains_a_single_time() {
    let (queue, runtime, _tx) = runtime(
        DriveMode::SelfPolling {
            interval: Duration::from_secs(30),
        },
        true,
    );
    queue.push_workitem(WIQ, WorkitemBuilder::new("w1").build());
    queue.push_workitem(WIQ, WorkitemBuilder::new("w2").build());

    let totals = with_timeout(runtime.run()).await.unwrap();

    assert_eq!(totals.processed, 2);
    assert_eq!(queue.pop_calls(), 3);
}

#[tokio::test]
async fn self_polling_sweeps_until_shutdown() {
    let (queue, runtime, tx) = runtime(
        DriveMode::SelfPolling {
            interval: Duration::from_millis(20),
        },
        false,
    );
    let first = queue.push_workitem(WIQ, WorkitemBuilder::new("w1").build());
    let handle = tokio::spawn(runtime.run());

    with_timeout(wait_until(|| queue.update_calls() == 1)).await;

    // Work that arrives between sweeps is picked up by a later sweep.
    let second = queue.push_workitem(WIQ, WorkitemBuilder::new("w2").build());
    with_timeout(wait_until(|| queue.update_calls() == 2)).await;

    tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();
    let totals = with_timeout(handle).await.unwrap().unwrap();

    assert_eq!(totals.processed, 2);
    assert_eq!(queue.record(&first).unwrap().state, WorkitemState::Successful);
    assert_eq!(queue.record(&second).unwrap().state, WorkitemState::Successful);
    assert!(queue.pop_calls() >= 3);
}

#[tokio::test]
async fn self_polling_survives_transport_failures() {
    let (queue, runtime, tx) = runtime(
        DriveMode::SelfPolling {
            interval: Duration::from_millis(10),
        },
        false,
    );
    queue.push_workitem(WIQ, WorkitemBuilder::new("w1").build());
    queue.fail_next_pops(2);
    let handle = tokio::spawn(runtime.run());

    with_timeout(wait_until(|| queue.update_calls() == 1)).await;
    tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();
    let totals = with_timeout(handle).await.unwrap().unwrap();

    assert_eq!(totals.processed, 1);
}

#[tokio::test]
async fn event_driven_mode_drains_only_on_notification() {
    let (queue, runtime, tx) = runtime(
        DriveMode::EventDriven {
            queue: "robotqueue".to_string(),
            idle_tick: Duration::from_millis(10),
        },
        false,
    );
    for i in 0..3 {
        queue.push_workitem(WIQ, WorkitemBuilder::new(&format!("w{i}")).build());
    }
    let handle = tokio::spawn(runtime.run());

    // Nothing happens before a notification arrives.
    sleep(Duration::from_millis(50)).await;
    assert_eq!(queue.pop_calls(), 0);

    with_timeout(async {
        while queue.notify("robotqueue") == 0 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    // One notification drains the whole queue.
    with_timeout(wait_until(|| queue.update_calls() == 3)).await;
    assert_eq!(queue.pending(WIQ), 0);

    queue.push_workitem(WIQ, WorkitemBuilder::new("late").build());
    assert_eq!(queue.notify("robotqueue"), 1);
    with_timeout(wait_until(|| queue.update_calls() == 4)).await;

    tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();
    let totals = timeout(Duration::from_secs(5), handle)
        .await
        .expect("runtime did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(totals.processed, 4);
}

#[tokio::test]
async fn closing_the_event_channel_stops_the_runtime() {
    let (_queue, runtime, tx) = runtime(
        DriveMode::EventDriven {
            queue: "robotqueue".to_string(),
            idle_tick: Duration::from_millis(10),
        },
        false,
    );
    let handle = tokio::spawn(runtime.run());
    drop(tx);

    let totals = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(totals.processed, 0);
}
