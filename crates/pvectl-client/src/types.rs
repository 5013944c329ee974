//! Wire types for the Proxmox VE API.
//!
//! Proxmox encodes booleans as `0`/`1` and is loose about numbers versus
//! numeric strings, so several fields go through lenient deserializers.

use serde::{Deserialize, Serialize};

/// Current runtime status of a VM (`GET /nodes/{node}/qemu/{vmid}/status/current`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmStatus {
    /// `running`, `stopped`, `paused`, or another remote-defined value.
    pub status: String,
    /// VM name.
    #[serde(default)]
    pub name: Option<String>,
    /// QEMU monitor status, more detailed than `status`.
    #[serde(default)]
    pub qmpstatus: Option<String>,
    /// Uptime in seconds.
    #[serde(default)]
    pub uptime: Option<u64>,
    /// Active lock (e.g. `backup`, `migrate`), if any.
    #[serde(default)]
    pub lock: Option<String>,
}

/// Entry of `GET /nodes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Node name.
    pub node: String,
    /// `online`, `offline` or `unknown`.
    #[serde(default)]
    pub status: Option<String>,
    /// CPU utilisation, 0.0 to 1.0.
    #[serde(default)]
    pub cpu: Option<f64>,
    /// Number of CPUs.
    #[serde(default)]
    pub maxcpu: Option<u32>,
    /// Used memory in bytes.
    #[serde(default)]
    pub mem: Option<u64>,
    /// Total memory in bytes.
    #[serde(default)]
    pub maxmem: Option<u64>,
    /// Uptime in seconds.
    #[serde(default)]
    pub uptime: Option<u64>,
}

/// Body of `GET /nodes/{node}/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Uptime in seconds.
    #[serde(default)]
    pub uptime: Option<u64>,
    /// CPU utilisation, 0.0 to 1.0.
    #[serde(default)]
    pub cpu: Option<f64>,
    /// CPU model information.
    #[serde(default)]
    pub cpuinfo: Option<CpuInfo>,
    /// Memory figures.
    #[serde(default)]
    pub memory: Option<MemoryInfo>,
    /// 1/5/15 minute load averages, as reported.
    #[serde(default)]
    pub loadavg: Vec<String>,
    /// Kernel version string.
    #[serde(default)]
    pub kversion: Option<String>,
    /// Proxmox VE version string.
    #[serde(default)]
    pub pveversion: Option<String>,
}

/// CPU section of a node status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    /// CPU model name.
    #[serde(default)]
    pub model: Option<String>,
    /// Logical CPU count.
    #[serde(default)]
    pub cpus: Option<u32>,
}

/// Memory section of a node status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Used bytes.
    #[serde(default)]
    pub used: u64,
    /// Total bytes.
    #[serde(default)]
    pub total: u64,
}

/// Entry of `GET /nodes/{node}/qemu`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmEntry {
    /// VM id (numeric on the wire, kept as a string).
    #[serde(deserialize_with = "de::string_or_number")]
    pub vmid: String,
    /// VM name.
    #[serde(default)]
    pub name: String,
    /// Runtime status.
    #[serde(default)]
    pub status: String,
    /// Used memory in bytes.
    #[serde(default)]
    pub mem: u64,
    /// Configured memory in bytes.
    #[serde(default)]
    pub maxmem: u64,
}

/// Subset of `GET /nodes/{node}/qemu/{vmid}/config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmConfig {
    /// Cores per socket.
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub cores: Option<u32>,
    /// Socket count.
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub sockets: Option<u32>,
    /// VM name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Entry of `GET /nodes/{node}/lxc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerEntry {
    /// Container id.
    #[serde(deserialize_with = "de::string_or_number")]
    pub vmid: String,
    /// Container hostname.
    #[serde(default)]
    pub name: String,
    /// Runtime status.
    #[serde(default)]
    pub status: String,
    /// Used memory in bytes.
    #[serde(default)]
    pub mem: u64,
    /// Configured memory in bytes.
    #[serde(default)]
    pub maxmem: u64,
}

/// Subset of `GET /nodes/{node}/lxc/{vmid}/config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Allocated cores.
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub cores: Option<u32>,
    /// Whether the container is a template.
    #[serde(default, deserialize_with = "de::opt_flag")]
    pub template: Option<bool>,
}

/// Entry of `GET /nodes/{node}/storage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEntry {
    /// Storage id.
    pub storage: String,
    /// Storage type (`dir`, `lvmthin`, `zfspool`, ...).
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Comma-separated content types.
    #[serde(default)]
    pub content: String,
    /// Whether the storage is enabled.
    #[serde(default, deserialize_with = "de::opt_flag")]
    pub enabled: Option<bool>,
    /// Whether the storage is active on this node.
    #[serde(default, deserialize_with = "de::opt_flag")]
    pub active: Option<bool>,
    /// Used bytes.
    #[serde(default)]
    pub used: u64,
    /// Total bytes.
    #[serde(default)]
    pub total: u64,
    /// Available bytes.
    #[serde(default)]
    pub avail: u64,
}

/// Entry of `GET /cluster/status`. The list holds one `cluster` entry and
/// one `node` entry per member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterStatusEntry {
    /// `cluster` or `node`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Cluster or node name.
    #[serde(default)]
    pub name: String,
    /// Member count (cluster entry).
    #[serde(default)]
    pub nodes: Option<u32>,
    /// Quorum state (cluster entry).
    #[serde(default, deserialize_with = "de::opt_flag")]
    pub quorate: Option<bool>,
    /// Whether the node is online (node entry).
    #[serde(default, deserialize_with = "de::opt_flag")]
    pub online: Option<bool>,
    /// Whether this is the node serving the request (node entry).
    #[serde(default, deserialize_with = "de::opt_flag")]
    pub local: Option<bool>,
    /// Node address (node entry).
    #[serde(default)]
    pub ip: Option<String>,
}

/// Parameters for `POST /nodes/{node}/qemu`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmCreateSpec {
    /// Id of the new VM.
    pub vmid: String,
    /// Name of the new VM.
    pub name: String,
    /// Guest OS type (`l26` for Linux 2.6+).
    pub ostype: String,
    /// Memory in MiB.
    pub memory: u32,
    /// Cores per socket.
    pub cores: u32,
    /// Socket count.
    pub sockets: u32,
    /// Boot disk, `{storage}:{size}`.
    pub scsi0: String,
    /// Boot order.
    pub boot: String,
    /// First network interface.
    pub net0: String,
}

/// Body of `POST .../agent/exec`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExecStarted {
    pub pid: u64,
}

/// Body of `GET .../agent/exec-status`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExecStatus {
    #[serde(default, deserialize_with = "de::opt_flag")]
    pub exited: Option<bool>,
    #[serde(default)]
    pub exitcode: Option<i64>,
    #[serde(rename = "out-data", default)]
    pub out_data: Option<String>,
    #[serde(rename = "err-data", default)]
    pub err_data: Option<String>,
}

pub(crate) mod de {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        match Value::deserialize(d)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(D::Error::custom(format!(
                "expected string or number, got {other}"
            ))),
        }
    }

    pub fn opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("out of range: {n}"))),
            Some(Value::String(s)) => s.trim().parse().map(Some).map_err(D::Error::custom),
            Some(other) => Err(D::Error::custom(format!("expected integer, got {other}"))),
        }
    }

    pub fn opt_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(Value::Number(n)) => Ok(Some(n.as_i64().unwrap_or(0) != 0)),
            Some(Value::String(s)) => Ok(Some(matches!(s.as_str(), "1" | "true"))),
            Some(other) => Err(D::Error::custom(format!("expected flag, got {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vm_entry_accepts_numeric_vmid() {
        let entry: VmEntry = serde_json::from_value(json!({
            "vmid": 100,
            "name": "web",
            "status": "running",
            "mem": 1024,
            "maxmem": 2048
        }))
        .unwrap();
        assert_eq!(entry.vmid, "100");
        assert_eq!(entry.maxmem, 2048);
    }

    #[test]
    fn vm_entry_memory_defaults_to_zero() {
        let entry: VmEntry =
            serde_json::from_value(json!({"vmid": "101", "name": "db", "status": "stopped"}))
                .unwrap();
        assert_eq!(entry.mem, 0);
        assert_eq!(entry.maxmem, 0);
    }

    #[test]
    fn vm_config_cores_lenient() {
        let config: VmConfig = serde_json::from_value(json!({"cores": "4"})).unwrap();
        assert_eq!(config.cores, Some(4));

        let config: VmConfig = serde_json::from_value(json!({"memory": "512"})).unwrap();
        assert_eq!(config.cores, None);
    }

    #[test]
    fn cluster_flags_from_integers() {
        let entry: ClusterStatusEntry = serde_json::from_value(json!({
            "type": "cluster",
            "name": "lab",
            "nodes": 3,
            "quorate": 1
        }))
        .unwrap();
        assert_eq!(entry.quorate, Some(true));
        assert_eq!(entry.online, None);
    }

    #[test]
    fn exec_status_field_names() {
        let status: ExecStatus = serde_json::from_value(json!({
            "exited": 1,
            "exitcode": 0,
            "out-data": "Linux vm1\n"
        }))
        .unwrap();
        assert_eq!(status.exited, Some(true));
        assert_eq!(status.out_data.as_deref(), Some("Linux vm1\n"));
        assert!(status.err_data.is_none());
    }
}
