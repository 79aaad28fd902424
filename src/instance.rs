use crate::{PanelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the surrounding workspace knows about the currently selected tree node.
/// Any field may be missing; [`VmIdentity::from_selection`] decides whether it
/// is enough to build a panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub node: Option<String>,
    pub vmid: Option<u32>,
    pub name: Option<String>,
}

impl Selection {
    pub fn new(node: impl Into<String>, vmid: u32) -> Self {
        Self {
            node: Some(node.into()),
            vmid: Some(vmid),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// (node, vmid) pair a panel is bound to for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VmIdentity {
    node: String,
    vmid: u32,
    name: Option<String>,
}

impl VmIdentity {
    pub fn from_selection(selection: &Selection) -> Result<Self> {
        let node = selection
            .node
            .as_deref()
            .map(str::trim)
            .filter(|node| !node.is_empty())
            .ok_or(PanelError::MissingNode)?;

        let vmid = selection
            .vmid
            .filter(|vmid| *vmid != 0)
            .ok_or(PanelError::MissingVmid)?;

        let name = selection
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Ok(Self {
            node: node.to_string(),
            vmid,
            name,
        })
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn vmid(&self) -> u32 {
        self.vmid
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn selection(&self) -> Selection {
        Selection {
            node: Some(self.node.clone()),
            vmid: Some(self.vmid),
            name: self.name.clone(),
        }
    }

    /// Panel title, e.g. `Virtual machine 'web' 'KVM 100' on node 'pve1'`.
    pub fn title(&self) -> String {
        let descr = self
            .name
            .as_ref()
            .map(|name| format!("'{}' ", name))
            .unwrap_or_default();
        format!(
            "Virtual machine {}'KVM {}' on node '{}'",
            descr, self.vmid, self.node
        )
    }

    /// API path of the VM resource, relative to the API root.
    pub fn resource_path(&self) -> String {
        format!("/nodes/{}/qemu/{}", self.node, self.vmid)
    }
}

impl fmt::Display for VmIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node, self.vmid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VmStatus {
    Running,
    Stopped,
    #[default]
    Unknown,
    /// Anything else the server reports (`paused`, `suspended`, ...), verbatim.
    Other(String),
}

impl VmStatus {
    pub fn from_api(value: &str) -> Self {
        match value {
            "running" => VmStatus::Running,
            "stopped" => VmStatus::Stopped,
            "unknown" | "" => VmStatus::Unknown,
            other => VmStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            VmStatus::Running => "running",
            VmStatus::Stopped => "stopped",
            VmStatus::Unknown => "unknown",
            VmStatus::Other(value) => value,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, VmStatus::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, VmStatus::Stopped)
    }
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `GET /nodes/{node}/qemu/{vmid}/status/current`. Only `status`
/// drives the panel; the rest feeds the summary section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub qmpstatus: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cpu: Option<f64>,
    #[serde(default)]
    pub cpus: Option<f64>,
    #[serde(default)]
    pub mem: Option<u64>,
    #[serde(default)]
    pub maxmem: Option<u64>,
    #[serde(default)]
    pub uptime: Option<u64>,
    #[serde(default)]
    pub pid: Option<u64>,
    #[serde(default)]
    pub lock: Option<String>,
}

impl StatusRecord {
    /// A record without a `status` field counts as unknown.
    pub fn vm_status(&self) -> VmStatus {
        self.status
            .as_deref()
            .map(VmStatus::from_api)
            .unwrap_or(VmStatus::Unknown)
    }
}
