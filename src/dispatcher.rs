use crate::api::ApiClient;
use crate::command::{CommandKind, VmCommand};
use crate::instance::VmIdentity;
use crate::{Result, log_error, log_info};
use chrono::{DateTime, Local, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use uuid::Uuid;

const MAX_EVENT_LINES: usize = 200;

/// A user-visible error message. Advisory only; nothing waits on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub command: Option<CommandKind>,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn error(command: Option<CommandKind>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: "Error".to_string(),
            message: message.into(),
            command,
            raised_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlertQueue {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl AlertQueue {
    pub fn push(&self, alert: Alert) {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(alert);
    }

    pub fn pending(&self) -> Vec<Alert> {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn dismiss(&self, id: Uuid) {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .retain(|alert| alert.id != id);
    }

    pub fn drain(&self) -> Vec<Alert> {
        std::mem::take(
            &mut *self
                .alerts
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    pub fn len(&self) -> usize {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Timestamped lines shown in the panel's event log, oldest first.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl EventLog {
    pub fn record(&self, message: impl Into<String>) {
        let mut lines = self
            .lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if lines.len() == MAX_EVENT_LINES {
            lines.pop_front();
        }
        lines.push_back(format!(
            "[{}] {}",
            Local::now().format("%H:%M:%S"),
            message.into()
        ));
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

struct BusyGuard(Arc<AtomicUsize>);

impl BusyGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter.clone())
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Sends state-changing requests for one VM. One call, one request; failures
/// become alerts and are not retried.
#[derive(Clone)]
pub struct CommandDispatcher {
    identity: VmIdentity,
    api: Arc<dyn ApiClient>,
    alerts: AlertQueue,
    events: EventLog,
    in_flight: Arc<AtomicUsize>,
}

impl CommandDispatcher {
    pub fn new(identity: VmIdentity, api: Arc<dyn ApiClient>) -> Self {
        Self {
            identity,
            api,
            alerts: AlertQueue::default(),
            events: EventLog::default(),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn alerts(&self) -> &AlertQueue {
        &self.alerts
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// True while at least one command request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    /// Run the command on `runtime` without waiting for it.
    pub fn dispatch(&self, runtime: &Handle, command: VmCommand) -> JoinHandle<()> {
        let guard = BusyGuard::enter(&self.in_flight);
        let this = self.clone();
        runtime.spawn(async move {
            let _guard = guard;
            let _ = this.execute(command).await;
        })
    }

    pub async fn execute(&self, command: VmCommand) -> Result<()> {
        let request = command.to_request(&self.identity);
        let kind = command.kind();

        log_info!("Sending {} for VM {}: {}", kind, self.identity, request);
        self.events.record(format!("{} requested ({})", kind, request));

        match self.api.send(&request).await {
            Ok(_) => {
                self.events.record(format!("{} accepted", kind));
                Ok(())
            }
            Err(err) => {
                let text = err.status_text();
                log_error!("{} failed for VM {}: {}", kind, self.identity, text);
                self.events.record(format!("{} failed: {}", kind, text));
                self.alerts.push(Alert::error(Some(kind), text));
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_log_keeps_last_entries() {
        let log = EventLog::default();
        for i in 0..=MAX_EVENT_LINES {
            log.record(format!("event {}", i));
        }

        let lines = log.lines();
        assert_eq!(lines.len(), MAX_EVENT_LINES);
        assert!(lines[0].ends_with("event 1"));
        assert!(lines.iter().all(|line| !line.ends_with("event 0")));
        assert!(lines[MAX_EVENT_LINES - 1].ends_with(&format!("event {}", MAX_EVENT_LINES)));
    }

    #[test]
    fn alert_queue_dismiss_and_drain() {
        let queue = AlertQueue::default();
        let first = Alert::error(Some(CommandKind::Stop), "500 Internal Server Error");
        queue.push(first.clone());
        queue.push(Alert::error(None, "console failed"));
        assert_eq!(queue.len(), 2);

        queue.dismiss(first.id);
        let rest = queue.drain();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].message, "console failed");
        assert!(queue.is_empty());
    }
}
