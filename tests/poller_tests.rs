// Integration tests for the status poller
mod common;

use common::{FakeApi, RecordingWorkspace, StatusReply, identity};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use vmpanel::{StatusPoller, StatusSnapshot, VmStatus};

const INTERVAL: Duration = Duration::from_millis(1000);

fn poller(api: Arc<FakeApi>, workspace: Arc<RecordingWorkspace>) -> StatusPoller {
    StatusPoller::new(identity(), api, workspace, INTERVAL, Handle::current())
}

async fn wait_for_requests(api: &FakeApi, count: usize) {
    while api.status_requests() < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_publishes_running_status() {
    let api = FakeApi::with_status("running");
    let workspace = RecordingWorkspace::new();
    let poller = poller(api.clone(), workspace.clone());
    let mut handle = poller.handle();

    poller.start();
    assert!(handle.changed().await, "first poll should publish");

    let snapshot = handle.latest();
    assert_eq!(snapshot.status, VmStatus::Running);
    assert!(!snapshot.poll_failed);
    assert_eq!(
        snapshot.record.as_ref().and_then(|r| r.name.as_deref()),
        Some("web")
    );
    assert!(workspace.migration_checks().is_empty());

    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_polls_on_interval_and_only_notifies_on_change() {
    let api = FakeApi::with_status("stopped");
    let workspace = RecordingWorkspace::new();
    let poller = poller(api.clone(), workspace.clone());
    let mut handle = poller.handle();

    poller.start();
    assert!(handle.changed().await);
    handle.latest();

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert!(api.status_requests() >= 3, "expected a read per interval");
    assert!(
        !handle.has_changed(),
        "identical responses must not notify subscribers"
    );

    api.set_status_reply(StatusReply::Record(json!({ "status": "running" })));
    assert!(handle.changed().await);
    assert_eq!(handle.latest().status, VmStatus::Running);

    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_failure_yields_unknown_and_one_migration_check_per_failure() {
    let api = FakeApi::failing();
    let workspace = RecordingWorkspace::new();
    let poller = poller(api.clone(), workspace.clone());
    let mut handle = poller.handle();

    poller.start();
    assert!(handle.changed().await);
    let snapshot = handle.latest();
    assert_eq!(snapshot.status, VmStatus::Unknown);
    assert!(snapshot.poll_failed);
    assert!(snapshot.record.is_none());

    tokio::time::sleep(Duration::from_millis(3500)).await;
    poller.stop();

    let checks = workspace.migration_checks();
    assert!(checks.len() >= 3);
    assert_eq!(checks.len() as u64, poller.failures());
    assert_eq!(checks.len(), api.status_requests());
    for selection in checks {
        assert_eq!(selection.node.as_deref(), Some("pve1"));
        assert_eq!(selection.vmid, Some(100));
    }
}

#[tokio::test(start_paused = true)]
async fn test_record_without_status_is_unknown_without_migration_check() {
    let api = FakeApi::with_status("running");
    api.set_status_reply(StatusReply::Record(json!({ "name": "web" })));
    let workspace = RecordingWorkspace::new();
    let poller = poller(api.clone(), workspace.clone());
    let mut handle = poller.handle();

    poller.start();
    assert!(handle.changed().await);
    let snapshot = handle.latest();
    assert_eq!(snapshot.status, VmStatus::Unknown);
    assert!(!snapshot.poll_failed);
    assert!(workspace.migration_checks().is_empty());

    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_stop_before_response_discards_it() {
    let gate = Arc::new(Notify::new());
    let api = FakeApi::gated(StatusReply::Fail, gate.clone());
    let workspace = RecordingWorkspace::new();
    let poller = poller(api.clone(), workspace.clone());
    let handle = poller.handle();

    poller.start();
    wait_for_requests(&api, 1).await;
    poller.stop();

    gate.notify_waiters();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(poller.applied_responses(), 0);
    assert_eq!(api.status_requests(), 1);
    assert!(workspace.migration_checks().is_empty());
    assert!(!handle.has_changed());
    assert_eq!(handle.current(), StatusSnapshot::default());
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_poll_in_flight() {
    let gate = Arc::new(Notify::new());
    let api = FakeApi::gated(
        StatusReply::Record(json!({ "status": "running" })),
        gate.clone(),
    );
    let workspace = RecordingWorkspace::new();
    let poller = poller(api.clone(), workspace.clone());

    poller.start();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(api.status_requests(), 1, "slow read must not overlap");

    gate.notify_one();
    wait_for_requests(&api, 2).await;
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(api.status_requests(), 2);
    assert_eq!(poller.applied_responses(), 1);

    poller.stop();
}

#[tokio::test(start_paused = true)]
async fn test_start_and_stop_are_idempotent() {
    let api = FakeApi::with_status("running");
    let workspace = RecordingWorkspace::new();
    let poller = poller(api.clone(), workspace);

    poller.stop();
    assert!(!poller.is_running());

    poller.start();
    poller.start();
    assert!(poller.is_running());
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(api.status_requests(), 1, "second start must not spawn another loop");

    poller.stop();
    poller.stop();
    assert!(!poller.is_running());

    let before = api.status_requests();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(api.status_requests(), before);

    // Restart after stop resumes polling.
    poller.start();
    wait_for_requests(&api, before + 1).await;
    poller.stop();
}
