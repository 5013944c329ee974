//! Request and response types for orchestration operations.
//!
//! These types are the JSON contract of the tool surface: field names are
//! stable and every record serializes to a flat object.

use std::fmt;
use std::str::FromStr;

use pvectl_client::ConfigError;
use pvectl_core::{NodeName, VmId};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Opaque identifier of an asynchronous remote task (a Proxmox UPID).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    /// Extract a handle from a remote acknowledgement.
    ///
    /// Only a JSON string is a handle; anything else (null, objects, numbers)
    /// yields `None`. The string is kept exactly as received.
    #[must_use]
    pub fn from_ack(ack: &Value) -> Option<Self> {
        ack.as_str().map(|s| Self(s.to_string()))
    }

    /// Return the handle as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Always true on the non-error path.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Handle of the remote task, if the hypervisor returned one.
    pub task_handle: Option<TaskHandle>,
}

/// Result of VM creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResult {
    /// Always true on the non-error path.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Id of the created VM.
    pub vmid: String,
}

/// Request to create a VM with a minimal configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVmRequest {
    /// Node to create the VM on.
    pub node: NodeName,
    /// Id of the new VM.
    pub vmid: VmId,
    /// Name of the new VM.
    pub name: String,
    /// Memory in MiB.
    pub memory: u32,
    /// CPU cores.
    pub cores: u32,
}

impl CreateVmRequest {
    /// Default memory in MiB.
    pub const DEFAULT_MEMORY: u32 = 512;
    /// Default core count.
    pub const DEFAULT_CORES: u32 = 1;

    /// Create a request with default memory and cores.
    #[must_use]
    pub fn new(node: NodeName, vmid: VmId, name: impl Into<String>) -> Self {
        Self {
            node,
            vmid,
            name: name.into(),
            memory: Self::DEFAULT_MEMORY,
            cores: Self::DEFAULT_CORES,
        }
    }

    /// Set the memory in MiB.
    #[must_use]
    pub const fn with_memory(mut self, memory: u32) -> Self {
        self.memory = memory;
        self
    }

    /// Set the core count.
    #[must_use]
    pub const fn with_cores(mut self, cores: u32) -> Self {
        self.cores = cores;
        self
    }
}

/// A value obtained from a secondary fetch that may have failed.
///
/// Serializes as the value itself, or as the string `"N/A"` when unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrichment<T> {
    /// The fetch succeeded.
    Available(T),
    /// The fetch failed or the field was absent.
    Unavailable,
}

impl<T> Enrichment<T> {
    /// Returns the value if available.
    #[must_use]
    pub const fn as_option(&self) -> Option<&T> {
        match self {
            Self::Available(v) => Some(v),
            Self::Unavailable => None,
        }
    }
}

impl<T> From<Option<T>> for Enrichment<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unavailable, Self::Available)
    }
}

impl<T: Serialize> Serialize for Enrichment<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Available(v) => v.serialize(serializer),
            Self::Unavailable => serializer.serialize_str("N/A"),
        }
    }
}

/// One VM in the cluster-wide inventory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryRecord {
    /// VM id.
    pub vmid: String,
    /// VM name.
    pub name: String,
    /// Runtime status.
    pub status: String,
    /// Node the VM lives on.
    pub node: String,
    /// Configured cores, or `"N/A"` if the config could not be read.
    pub cpu_cores: Enrichment<u32>,
    /// Used memory in bytes.
    pub memory_used: u64,
    /// Configured memory in bytes.
    pub memory_total: u64,
}

/// One LXC container in the cluster-wide inventory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerRecord {
    /// Container id.
    pub vmid: String,
    /// Container hostname.
    pub name: String,
    /// Runtime status.
    pub status: String,
    /// Node the container lives on.
    pub node: String,
    /// Configured cores, or `"N/A"`.
    pub cpu_cores: Enrichment<u32>,
    /// Used memory in bytes.
    pub memory_used: u64,
    /// Configured memory in bytes.
    pub memory_total: u64,
    /// Whether the container is a template, or `"N/A"`.
    pub template: Enrichment<bool>,
}

/// One node in the cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    /// Node name.
    pub node: String,
    /// `online`, `offline` or `unknown`.
    pub status: String,
    /// CPU utilisation, 0.0 to 1.0.
    pub cpu_usage: f64,
    /// Number of CPUs.
    pub cpu_count: u32,
    /// Used memory in bytes.
    pub memory_used: u64,
    /// Total memory in bytes.
    pub memory_total: u64,
    /// Uptime in seconds.
    pub uptime: u64,
}

/// Detailed status of a single node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStatusRecord {
    /// Node name.
    pub node: String,
    /// Uptime in seconds.
    pub uptime: u64,
    /// CPU utilisation, 0.0 to 1.0.
    pub cpu_usage: f64,
    /// Number of CPUs.
    pub cpu_count: u32,
    /// CPU model name.
    pub cpu_model: String,
    /// Used memory in bytes.
    pub memory_used: u64,
    /// Total memory in bytes.
    pub memory_total: u64,
    /// 1/5/15 minute load averages.
    pub load_average: Vec<String>,
    /// Kernel version.
    pub kernel: String,
    /// Proxmox VE version.
    pub pve_version: String,
}

/// One storage pool as seen from one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageRecord {
    /// Storage id.
    pub storage: String,
    /// Node the pool was listed on.
    pub node: String,
    /// Storage type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Comma-separated content types.
    pub content: String,
    /// Whether the pool is enabled.
    pub enabled: bool,
    /// Whether the pool is active on the node.
    pub active: bool,
    /// Used bytes.
    pub used: u64,
    /// Total bytes.
    pub total: u64,
    /// Available bytes.
    pub available: u64,
}

/// Cluster membership and quorum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterStatusRecord {
    /// Cluster name (empty for a standalone node).
    pub name: String,
    /// Whether the cluster has quorum.
    pub quorate: bool,
    /// Number of member nodes.
    pub node_count: u32,
    /// Member nodes.
    pub nodes: Vec<ClusterNodeRecord>,
}

/// A cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterNodeRecord {
    /// Node name.
    pub name: String,
    /// Whether the node is online.
    pub online: bool,
    /// Node address, if known.
    pub ip: Option<String>,
    /// Whether this node served the request.
    pub local: bool,
}

/// What to do when enumerating one node's guests fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeFailurePolicy {
    /// Fail the whole listing.
    #[default]
    Abort,
    /// Log a warning and leave that node's records out.
    Skip,
}

impl FromStr for NodeFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(format!("expected 'abort' or 'skip', got '{other}'")),
        }
    }
}

/// Configuration for the orchestration service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ControlConfig {
    /// Storage pool for the boot disk of created VMs.
    #[serde(default = "ControlConfig::default_storage")]
    pub default_storage: String,
    /// Bridge for the first NIC of created VMs.
    #[serde(default = "ControlConfig::default_bridge")]
    pub default_bridge: String,
    /// Behaviour when one node's enumeration fails during a listing.
    #[serde(default)]
    pub node_failure_policy: NodeFailurePolicy,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            default_storage: Self::default_storage(),
            default_bridge: Self::default_bridge(),
            node_failure_policy: NodeFailurePolicy::default(),
        }
    }
}

impl ControlConfig {
    fn default_storage() -> String {
        "local-zfs".to_string()
    }

    fn default_bridge() -> String {
        "vmbr0".to_string()
    }

    /// Load from `PVECTL_*` environment variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `PVECTL_NODE_FAILURE_POLICY` is set
    /// to something other than `abort` or `skip`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(storage) = env("PVECTL_DEFAULT_STORAGE") {
            config.default_storage = storage;
        }
        if let Some(bridge) = env("PVECTL_DEFAULT_BRIDGE") {
            config.default_bridge = bridge;
        }
        if let Some(policy) = env("PVECTL_NODE_FAILURE_POLICY") {
            config.node_failure_policy =
                policy.parse().map_err(|reason| ConfigError::Invalid {
                    var: "PVECTL_NODE_FAILURE_POLICY",
                    reason,
                })?;
        }

        Ok(config)
    }
}

fn env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}
