//! Periodic VM status reads.
//!
//! The poller owns the single status container of a panel (a `watch`
//! channel). Sections and the toolbar read it through [`StatusHandle`].
//!
//! Requests are issued sequentially: the loop waits for a response before it
//! waits for the next tick, so at most one read is in flight. Every start
//! bumps an epoch; a response is applied only while its epoch is current, and
//! `stop` bumps it again under the same lock, so nothing from an older run can
//! touch the state once `stop` has returned.

use crate::api::{ApiClient, fetch_status};
use crate::instance::{StatusRecord, VmIdentity, VmStatus};
use crate::workspace::Workspace;
use crate::{Result, log_debug, log_info};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub status: VmStatus,
    pub record: Option<StatusRecord>,
    /// The last read failed.
    pub poll_failed: bool,
    /// Time of the last applied response. Not part of change detection.
    pub updated_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    fn same_content(&self, other: &StatusSnapshot) -> bool {
        self.status == other.status
            && self.record == other.record
            && self.poll_failed == other.poll_failed
    }
}

/// Read side of the panel's status container.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    rx: watch::Receiver<StatusSnapshot>,
}

impl StatusHandle {
    pub fn current(&self) -> StatusSnapshot {
        self.rx.borrow().clone()
    }

    pub fn status(&self) -> VmStatus {
        self.rx.borrow().status.clone()
    }

    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Mark the current value as seen and return it.
    pub fn latest(&mut self) -> StatusSnapshot {
        self.rx.borrow_and_update().clone()
    }

    /// Wait for the next change. Returns `false` once the poller is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[derive(Debug, Default)]
struct PollerState {
    epoch: u64,
    task: Option<JoinHandle<()>>,
    applied: u64,
    failures: u64,
}

struct PollerInner {
    identity: VmIdentity,
    api: Arc<dyn ApiClient>,
    workspace: Arc<dyn Workspace>,
    interval: Duration,
    tx: watch::Sender<StatusSnapshot>,
    state: Mutex<PollerState>,
}

impl PollerInner {
    fn lock(&self) -> MutexGuard<'_, PollerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns `false` when the run that produced `result` has been stopped.
    fn apply(&self, epoch: u64, result: Result<StatusRecord>) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch || state.task.is_none() {
            return false;
        }

        let next = match result {
            Ok(record) => StatusSnapshot {
                status: record.vm_status(),
                record: Some(record),
                poll_failed: false,
                updated_at: Some(Utc::now()),
            },
            Err(err) => {
                log_debug!("Status poll for {} failed: {}", self.identity, err);
                state.failures += 1;
                self.workspace
                    .check_vm_migration(&self.identity.selection());
                StatusSnapshot {
                    status: VmStatus::Unknown,
                    record: None,
                    poll_failed: true,
                    updated_at: Some(Utc::now()),
                }
            }
        };

        state.applied += 1;
        self.tx.send_if_modified(|current| {
            let changed = !current.same_content(&next);
            *current = next;
            changed
        });
        true
    }
}

pub struct StatusPoller {
    inner: Arc<PollerInner>,
    runtime: Handle,
}

impl StatusPoller {
    pub fn new(
        identity: VmIdentity,
        api: Arc<dyn ApiClient>,
        workspace: Arc<dyn Workspace>,
        interval: Duration,
        runtime: Handle,
    ) -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::default());
        Self {
            inner: Arc::new(PollerInner {
                identity,
                api,
                workspace,
                interval,
                tx,
                state: Mutex::new(PollerState::default()),
            }),
            runtime,
        }
    }

    pub fn handle(&self) -> StatusHandle {
        StatusHandle {
            rx: self.inner.tx.subscribe(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Begin polling. The first read is issued immediately. No-op while running.
    pub fn start(&self) {
        let mut state = self.inner.lock();
        if state.task.is_some() {
            return;
        }

        state.epoch += 1;
        let epoch = state.epoch;
        let inner = self.inner.clone();
        log_info!(
            "Starting status updates for {} every {:?}",
            self.inner.identity,
            self.inner.interval
        );
        state.task = Some(self.runtime.spawn(poll_loop(inner, epoch)));
    }

    /// Stop polling. Safe to call repeatedly or before `start`.
    pub fn stop(&self) {
        let mut state = self.inner.lock();
        if let Some(task) = state.task.take() {
            state.epoch += 1;
            task.abort();
            log_info!("Stopped status updates for {}", self.inner.identity);
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().task.is_some()
    }

    /// Responses applied to the status container so far.
    pub fn applied_responses(&self) -> u64 {
        self.inner.lock().applied
    }

    pub fn failures(&self) -> u64 {
        self.inner.lock().failures
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(inner: Arc<PollerInner>, epoch: u64) {
    let mut ticker = tokio::time::interval(inner.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let result = fetch_status(inner.api.as_ref(), &inner.identity).await;
        if !inner.apply(epoch, result) {
            break;
        }
    }
}
