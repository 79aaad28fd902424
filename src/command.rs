use crate::instance::VmIdentity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Start,
    Stop,
    Reset,
    Shutdown,
    Migrate,
    Remove,
}

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    /// `/nodes/{node}/qemu/{vmid}/status/{cmd}`
    Status(&'static str),
    /// `/nodes/{node}/qemu/{vmid}/migrate`
    Migrate,
    /// `/nodes/{node}/qemu/{vmid}`
    Resource,
}

#[derive(Debug, Clone, Copy)]
struct CommandSpec {
    kind: CommandKind,
    method: HttpMethod,
    endpoint: Endpoint,
    /// `{vmid}` is substituted when the prompt is rendered.
    confirm: Option<&'static str>,
}

const COMMAND_TABLE: [CommandSpec; 6] = [
    CommandSpec {
        kind: CommandKind::Start,
        method: HttpMethod::Post,
        endpoint: Endpoint::Status("start"),
        confirm: None,
    },
    CommandSpec {
        kind: CommandKind::Stop,
        method: HttpMethod::Post,
        endpoint: Endpoint::Status("stop"),
        confirm: Some("Do you really want to stop the VM?"),
    },
    CommandSpec {
        kind: CommandKind::Reset,
        method: HttpMethod::Post,
        endpoint: Endpoint::Status("reset"),
        confirm: Some("Do you really want to reset the VM?"),
    },
    CommandSpec {
        kind: CommandKind::Shutdown,
        method: HttpMethod::Post,
        endpoint: Endpoint::Status("shutdown"),
        confirm: Some("Do you really want to shutdown the VM?"),
    },
    CommandSpec {
        kind: CommandKind::Migrate,
        method: HttpMethod::Post,
        endpoint: Endpoint::Migrate,
        confirm: None,
    },
    CommandSpec {
        kind: CommandKind::Remove,
        method: HttpMethod::Delete,
        endpoint: Endpoint::Resource,
        confirm: Some(
            "Are you sure you want to remove VM {vmid}? This will permanently erase all VM data.",
        ),
    },
];

impl CommandKind {
    pub const ALL: [CommandKind; 6] = [
        CommandKind::Start,
        CommandKind::Stop,
        CommandKind::Reset,
        CommandKind::Shutdown,
        CommandKind::Migrate,
        CommandKind::Remove,
    ];

    fn spec(self) -> &'static CommandSpec {
        // The table is ordered like the enum.
        &COMMAND_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Start => "start",
            CommandKind::Stop => "stop",
            CommandKind::Reset => "reset",
            CommandKind::Shutdown => "shutdown",
            CommandKind::Migrate => "migrate",
            CommandKind::Remove => "remove",
        }
    }

    pub fn method(self) -> HttpMethod {
        self.spec().method
    }

    pub fn requires_confirmation(self) -> bool {
        self.spec().confirm.is_some()
    }

    pub fn confirmation_text(self, identity: &VmIdentity) -> Option<String> {
        self.spec()
            .confirm
            .map(|text| text.replace("{vmid}", &identity.vmid().to_string()))
    }

    pub fn path(self, identity: &VmIdentity) -> String {
        let base = identity.resource_path();
        match self.spec().endpoint {
            Endpoint::Status(cmd) => format!("{}/status/{}", base, cmd),
            Endpoint::Migrate => format!("{}/migrate", base),
            Endpoint::Resource => base,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command plus its body parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmCommand {
    kind: CommandKind,
    params: BTreeMap<String, String>,
}

impl VmCommand {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    pub fn start() -> Self {
        Self::new(CommandKind::Start)
    }

    pub fn stop(timeout_seconds: Option<u64>) -> Self {
        Self::with_timeout(CommandKind::Stop, timeout_seconds)
    }

    pub fn reset() -> Self {
        Self::new(CommandKind::Reset)
    }

    pub fn shutdown(timeout_seconds: Option<u64>) -> Self {
        Self::with_timeout(CommandKind::Shutdown, timeout_seconds)
    }

    pub fn migrate(target: impl Into<String>, online: bool) -> Self {
        Self::new(CommandKind::Migrate)
            .with_param("target", target.into())
            .with_param("online", if online { 1 } else { 0 })
    }

    pub fn remove() -> Self {
        Self::new(CommandKind::Remove)
    }

    fn with_timeout(kind: CommandKind, timeout_seconds: Option<u64>) -> Self {
        let command = Self::new(kind);
        match timeout_seconds {
            Some(timeout) => command.with_param("timeout", timeout),
            None => command,
        }
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn to_request(&self, identity: &VmIdentity) -> ApiRequest {
        ApiRequest {
            method: self.kind.method(),
            path: self.kind.path(identity),
            params: self
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// One outbound request, independent of the HTTP client that sends it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            params: Vec::new(),
        }
    }

    pub fn status_current(identity: &VmIdentity) -> Self {
        Self::get(format!("{}/status/current", identity.resource_path()))
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
