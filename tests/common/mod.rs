// Shared fakes for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use vmpanel::command::{ApiRequest, HttpMethod};
use vmpanel::config::PanelConfig;
use vmpanel::{ApiClient, PanelError, Result, Selection, VmIdentity, Workspace};

#[derive(Clone)]
pub enum StatusReply {
    Record(Value),
    Fail,
}

/// In-memory API. Records every request; status reads answer with the
/// configured reply, commands succeed unless `command_error` is set.
pub struct FakeApi {
    requests: Mutex<Vec<ApiRequest>>,
    status: Mutex<StatusReply>,
    command_error: Mutex<Option<(u16, String)>>,
    status_gate: Option<Arc<Notify>>,
    command_gate: Option<Arc<Notify>>,
}

impl FakeApi {
    pub fn with_status(status: &str) -> Arc<Self> {
        Arc::new(Self::build(StatusReply::Record(json!({
            "status": status,
            "name": "web",
            "cpus": 2,
            "uptime": 120,
        }))))
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self::build(StatusReply::Fail))
    }

    /// Status reads block until `gate` is notified.
    pub fn gated(reply: StatusReply, gate: Arc<Notify>) -> Arc<Self> {
        let mut api = Self::build(reply);
        api.status_gate = Some(gate);
        Arc::new(api)
    }

    /// Status reads answer immediately; commands block until `gate` is notified.
    pub fn with_gated_commands(status: &str, gate: Arc<Notify>) -> Arc<Self> {
        let mut api = Self::build(StatusReply::Record(json!({ "status": status })));
        api.command_gate = Some(gate);
        Arc::new(api)
    }

    fn build(reply: StatusReply) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status: Mutex::new(reply),
            command_error: Mutex::new(None),
            status_gate: None,
            command_gate: None,
        }
    }

    pub fn set_status_reply(&self, reply: StatusReply) {
        *self.status.lock().unwrap() = reply;
    }

    pub fn fail_commands(&self, status: u16, text: &str) {
        *self.command_error.lock().unwrap() = Some((status, text.to_string()));
    }

    pub fn status_requests(&self) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|req| is_status_read(req))
            .count()
    }

    /// Everything except the poller's status reads.
    pub fn command_requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|req| !is_status_read(req))
            .cloned()
            .collect()
    }
}

fn is_status_read(request: &ApiRequest) -> bool {
    request.method == HttpMethod::Get && request.path.ends_with("/status/current")
}

#[async_trait]
impl ApiClient for FakeApi {
    async fn send(&self, request: &ApiRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request.clone());

        if is_status_read(request) {
            if let Some(gate) = &self.status_gate {
                gate.notified().await;
            }
            let reply = self.status.lock().unwrap().clone();
            return match reply {
                StatusReply::Record(value) => Ok(value),
                StatusReply::Fail => Err(PanelError::Transport("connection refused".into())),
            };
        }

        if let Some(gate) = &self.command_gate {
            gate.notified().await;
        }
        let error = self.command_error.lock().unwrap().clone();
        match error {
            Some((status, status_text)) => Err(PanelError::Api {
                status,
                status_text,
            }),
            None => Ok(Value::Null),
        }
    }
}

#[derive(Default)]
pub struct RecordingWorkspace {
    migration_checks: Mutex<Vec<Selection>>,
    consoles: Mutex<Vec<VmIdentity>>,
    console_error: Mutex<Option<String>>,
}

impl RecordingWorkspace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn migration_checks(&self) -> Vec<Selection> {
        self.migration_checks.lock().unwrap().clone()
    }

    pub fn consoles(&self) -> Vec<VmIdentity> {
        self.consoles.lock().unwrap().clone()
    }

    pub fn fail_console(&self, message: &str) {
        *self.console_error.lock().unwrap() = Some(message.to_string());
    }
}

impl Workspace for RecordingWorkspace {
    fn check_vm_migration(&self, selection: &Selection) {
        self.migration_checks.lock().unwrap().push(selection.clone());
    }

    fn open_console(&self, identity: &VmIdentity) -> Result<()> {
        if let Some(message) = self.console_error.lock().unwrap().clone() {
            return Err(PanelError::Console(message));
        }
        self.consoles.lock().unwrap().push(identity.clone());
        Ok(())
    }
}

pub fn identity() -> VmIdentity {
    VmIdentity::from_selection(&Selection::new("pve1", 100)).unwrap()
}

pub fn config() -> PanelConfig {
    PanelConfig::default()
}
