//! Hooks into the application hosting the panel.

use crate::api::ApiClient;
use crate::command::ApiRequest;
use crate::instance::{Selection, VmIdentity};
use crate::{PanelError, Result, log_debug, log_info, log_warn};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;

/// Everything outside the panel that the panel needs to call back into.
/// Implementations must not block; they are invoked from the poller.
pub trait Workspace: Send + Sync {
    /// A status read failed; the VM may have moved to another node.
    fn check_vm_migration(&self, selection: &Selection);

    fn open_console(&self, identity: &VmIdentity) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ClusterResource {
    #[serde(rename = "type", default)]
    resource_type: Option<String>,
    #[serde(default)]
    node: Option<String>,
    #[serde(default)]
    vmid: Option<u32>,
    #[serde(default)]
    name: Option<String>,
}

/// Find where a guest currently lives via `GET /cluster/resources?type=vm`.
pub async fn locate_vm(api: &dyn ApiClient, vmid: u32) -> Result<Option<Selection>> {
    let mut request = ApiRequest::get("/cluster/resources");
    request.params.push(("type".to_string(), "vm".to_string()));

    let data = api.send(&request).await?;
    let resources: Vec<ClusterResource> = serde_json::from_value(data)?;

    Ok(resources
        .into_iter()
        .find(|res| res.vmid == Some(vmid) && res.resource_type.as_deref() == Some("qemu"))
        .and_then(|res| {
            res.node.map(|node| Selection {
                node: Some(node),
                vmid: Some(vmid),
                name: res.name,
            })
        }))
}

/// Workspace backed by the cluster API: migration checks look the VM up in
/// the cluster resource list, consoles open in the desktop browser.
///
/// One workspace serves every panel the application opens, so lookups and
/// their results are tracked per VM id.
pub struct ClusterWorkspace {
    api: Arc<dyn ApiClient>,
    runtime: Handle,
    origin: String,
    relocations: Arc<Mutex<HashMap<u32, Selection>>>,
    checks_in_flight: Arc<Mutex<HashSet<u32>>>,
}

impl ClusterWorkspace {
    pub fn new(api: Arc<dyn ApiClient>, runtime: Handle, origin: impl Into<String>) -> Self {
        Self {
            api,
            runtime,
            origin: origin.into(),
            relocations: Arc::new(Mutex::new(HashMap::new())),
            checks_in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// New location of VM `vmid`, if a migration check found it elsewhere.
    pub fn take_relocation(&self, vmid: u32) -> Option<Selection> {
        lock(&self.relocations).remove(&vmid)
    }

    /// Forget every recorded relocation.
    pub fn clear_relocations(&self) {
        lock(&self.relocations).clear();
    }

    /// True while a lookup for `vmid` is running.
    pub fn is_checking(&self, vmid: u32) -> bool {
        lock(&self.checks_in_flight).contains(&vmid)
    }

    pub fn console_url(&self, identity: &VmIdentity) -> String {
        console_url(&self.origin, identity)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn console_url(origin: &str, identity: &VmIdentity) -> String {
    format!(
        "{}/?console=kvm&novnc=1&vmid={}&node={}",
        origin.trim_end_matches('/'),
        identity.vmid(),
        identity.node()
    )
}

impl Workspace for ClusterWorkspace {
    fn check_vm_migration(&self, selection: &Selection) {
        let (Some(node), Some(vmid)) = (selection.node.clone(), selection.vmid) else {
            return;
        };

        // One lookup per VM at a time; failed polls arrive every interval.
        if !lock(&self.checks_in_flight).insert(vmid) {
            return;
        }

        let api = self.api.clone();
        let relocations = self.relocations.clone();
        let in_flight = self.checks_in_flight.clone();
        self.runtime.spawn(async move {
            match locate_vm(api.as_ref(), vmid).await {
                Ok(Some(found)) if found.node.as_deref() != Some(node.as_str()) => {
                    log_info!(
                        "VM {} moved from node '{}' to '{}'",
                        vmid,
                        node,
                        found.node.as_deref().unwrap_or_default()
                    );
                    lock(&relocations).insert(vmid, found);
                }
                Ok(_) => log_debug!("VM {} still on node '{}'", vmid, node),
                Err(err) => log_debug!("Migration check for VM {} failed: {}", vmid, err),
            }
            lock(&in_flight).remove(&vmid);
        });
    }

    fn open_console(&self, identity: &VmIdentity) -> Result<()> {
        let url = self.console_url(identity);
        log_info!("Opening console for {}: {}", identity, url);

        Command::new("xdg-open")
            .arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|e| {
                log_warn!("xdg-open failed for {}: {}", url, e);
                PanelError::Console(format!("{} ({})", url, e))
            })
    }
}
