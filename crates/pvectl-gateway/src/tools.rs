//! Tool catalog.
//!
//! Each tool has a stable name, a description, and a JSON Schema for its
//! argument object. Invoking a tool parses the arguments, calls the matching
//! [`VmControl`] operation and returns its result as JSON.

use std::fmt;
use std::str::FromStr;

use pvectl_control::{CreateVmRequest, VmControl};
use pvectl_core::{CoreError, NodeName, VmId};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::error::ApiError;

/// Every tool the gateway exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Tool {
    GetNodes,
    GetNodeStatus,
    GetVms,
    GetContainers,
    GetStorage,
    GetClusterStatus,
    StartVm,
    StopVm,
    ShutdownVm,
    RestartVm,
    CreateVm,
    DeleteVm,
    ExecuteVmCommand,
}

/// Catalog entry describing a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    /// Tool name, as used in `POST /v1/tools/:name`.
    pub name: &'static str,
    /// What the tool does.
    pub description: &'static str,
    /// JSON Schema of the argument object.
    pub parameters: Value,
}

impl Tool {
    /// All tools, in catalog order.
    pub const ALL: [Self; 13] = [
        Self::GetNodes,
        Self::GetNodeStatus,
        Self::GetVms,
        Self::GetContainers,
        Self::GetStorage,
        Self::GetClusterStatus,
        Self::StartVm,
        Self::StopVm,
        Self::ShutdownVm,
        Self::RestartVm,
        Self::CreateVm,
        Self::DeleteVm,
        Self::ExecuteVmCommand,
    ];

    /// The tool's wire name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetNodes => "get_nodes",
            Self::GetNodeStatus => "get_node_status",
            Self::GetVms => "get_vms",
            Self::GetContainers => "get_containers",
            Self::GetStorage => "get_storage",
            Self::GetClusterStatus => "get_cluster_status",
            Self::StartVm => "start_vm",
            Self::StopVm => "stop_vm",
            Self::ShutdownVm => "shutdown_vm",
            Self::RestartVm => "restart_vm",
            Self::CreateVm => "create_vm",
            Self::DeleteVm => "delete_vm",
            Self::ExecuteVmCommand => "execute_vm_command",
        }
    }

    /// Human-readable description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::GetNodes => "List cluster nodes with status, CPU and memory usage.",
            Self::GetNodeStatus => "Get detailed status of one node: uptime, CPU model, memory, load, versions.",
            Self::GetVms => "List all VMs across the cluster. cpu_cores is \"N/A\" when a VM's config cannot be read.",
            Self::GetContainers => "List all LXC containers across the cluster with cores and template flag. Either is \"N/A\" when the container config does not provide it.",
            Self::GetStorage => "List storage pools on every node with usage.",
            Self::GetClusterStatus => "Get cluster name, quorum state and member nodes.",
            Self::StartVm => "Start a VM. Fails if it is already running.",
            Self::StopVm => "Stop a VM immediately. Fails if it is already stopped.",
            Self::ShutdownVm => "Shut a VM down gracefully through the guest OS. Fails if it is already stopped.",
            Self::RestartVm => "Reboot a running VM through the guest OS.",
            Self::CreateVm => "Create a VM with a minimal configuration (memory defaults to 512 MiB, cores to 1).",
            Self::DeleteVm => "Delete a stopped VM permanently.",
            Self::ExecuteVmCommand => "Run a shell command inside a running VM via the QEMU guest agent.",
        }
    }

    /// JSON Schema of the argument object.
    #[must_use]
    pub fn parameters(self) -> Value {
        match self {
            Self::GetNodes
            | Self::GetVms
            | Self::GetContainers
            | Self::GetStorage
            | Self::GetClusterStatus => json!({"type": "object", "properties": {}}),
            Self::GetNodeStatus => json!({
                "type": "object",
                "properties": {"node": node_schema()},
                "required": ["node"]
            }),
            Self::StartVm | Self::StopVm | Self::ShutdownVm | Self::RestartVm | Self::DeleteVm => {
                json!({
                    "type": "object",
                    "properties": {"node": node_schema(), "vmid": vmid_schema()},
                    "required": ["node", "vmid"]
                })
            }
            Self::CreateVm => json!({
                "type": "object",
                "properties": {
                    "node": node_schema(),
                    "vmid": vmid_schema(),
                    "name": {"type": "string", "description": "VM name (e.g. 'test-vm')"},
                    "memory": {"type": "integer", "minimum": 1, "description": "Memory in MiB (default: 512)"},
                    "cores": {"type": "integer", "minimum": 1, "description": "CPU cores (default: 1)"}
                },
                "required": ["node", "vmid", "name"]
            }),
            Self::ExecuteVmCommand => json!({
                "type": "object",
                "properties": {
                    "node": node_schema(),
                    "vmid": vmid_schema(),
                    "command": {"type": "string", "description": "Shell command to run (e.g. 'uname -a')"}
                },
                "required": ["node", "vmid", "command"]
            }),
        }
    }

    /// Catalog entry for this tool.
    #[must_use]
    pub fn descriptor(self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }

    /// Parse `args` and run the tool against `control`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::BadRequest` for malformed arguments, and the mapped
    /// control error if the operation fails.
    pub async fn invoke<C>(self, control: &C, args: Value) -> Result<Value, ApiError>
    where
        C: VmControl + ?Sized,
    {
        match self {
            Self::GetNodes => to_json(&control.get_nodes().await?),
            Self::GetNodeStatus => {
                let args: NodeArgs = parse(args)?;
                let node = NodeName::new(args.node).map_err(CoreError::from)?;
                to_json(&control.get_node_status(&node).await?)
            }
            Self::GetVms => to_json(&control.get_vms().await?),
            Self::GetContainers => to_json(&control.get_containers().await?),
            Self::GetStorage => to_json(&control.get_storage().await?),
            Self::GetClusterStatus => to_json(&control.get_cluster_status().await?),
            Self::StartVm => {
                let (node, vmid) = parse::<VmArgs>(args)?.ids()?;
                to_json(&control.start_vm(&node, &vmid).await?)
            }
            Self::StopVm => {
                let (node, vmid) = parse::<VmArgs>(args)?.ids()?;
                to_json(&control.stop_vm(&node, &vmid).await?)
            }
            Self::ShutdownVm => {
                let (node, vmid) = parse::<VmArgs>(args)?.ids()?;
                to_json(&control.shutdown_vm(&node, &vmid).await?)
            }
            Self::RestartVm => {
                let (node, vmid) = parse::<VmArgs>(args)?.ids()?;
                to_json(&control.restart_vm(&node, &vmid).await?)
            }
            Self::DeleteVm => {
                let (node, vmid) = parse::<VmArgs>(args)?.ids()?;
                to_json(&control.delete_vm(&node, &vmid).await?)
            }
            Self::CreateVm => {
                let args: CreateArgs = parse(args)?;
                let request = args.into_request()?;
                to_json(&control.create_vm(request).await?)
            }
            Self::ExecuteVmCommand => {
                let args: CommandArgs = parse(args)?;
                let (node, vmid) = args.target.ids()?;
                to_json(
                    &control
                        .execute_vm_command(&node, &vmid, &args.command)
                        .await?,
                )
            }
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.name() == s)
            .ok_or_else(|| ApiError::UnknownTool(s.to_string()))
    }
}

/// Descriptors for every tool, in catalog order.
#[must_use]
pub fn catalog() -> Vec<ToolDescriptor> {
    Tool::ALL.into_iter().map(Tool::descriptor).collect()
}

fn node_schema() -> Value {
    json!({"type": "string", "description": "Host node name (e.g. 'pve1')"})
}

fn vmid_schema() -> Value {
    json!({"type": ["string", "integer"], "description": "VM ID (e.g. '100')"})
}

#[derive(Debug, Deserialize)]
struct NodeArgs {
    node: String,
}

#[derive(Debug, Deserialize)]
struct VmArgs {
    node: String,
    #[serde(deserialize_with = "string_or_integer")]
    vmid: String,
}

impl VmArgs {
    fn ids(self) -> Result<(NodeName, VmId), ApiError> {
        let node = NodeName::new(self.node).map_err(CoreError::from)?;
        let vmid = VmId::new(self.vmid).map_err(CoreError::from)?;
        Ok((node, vmid))
    }
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    #[serde(flatten)]
    target: VmArgs,
    name: String,
    #[serde(default)]
    memory: Option<u32>,
    #[serde(default)]
    cores: Option<u32>,
}

impl CreateArgs {
    fn into_request(self) -> Result<CreateVmRequest, ApiError> {
        let (node, vmid) = self.target.ids()?;
        let mut request = CreateVmRequest::new(node, vmid, self.name);
        if let Some(memory) = self.memory {
            request = request.with_memory(memory);
        }
        if let Some(cores) = self.cores {
            request = request.with_cores(cores);
        }
        Ok(request)
    }
}

#[derive(Debug, Deserialize)]
struct CommandArgs {
    #[serde(flatten)]
    target: VmArgs,
    command: String,
}

fn parse<T: DeserializeOwned>(args: Value) -> Result<T, ApiError> {
    serde_json::from_value(args).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(e.to_string()))
}

fn string_or_integer<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) if n.is_u64() || n.is_i64() => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "vmid must be a string or integer, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for tool in Tool::ALL {
            assert_eq!(tool.name().parse::<Tool>().unwrap(), tool);
        }
        assert!(matches!(
            "reset_vm".parse::<Tool>(),
            Err(ApiError::UnknownTool(_))
        ));
    }

    #[test]
    fn catalog_lists_every_tool() {
        let names: Vec<_> = catalog().iter().map(|d| d.name).collect();
        assert_eq!(names.len(), 13);
        assert!(names.contains(&"restart_vm"));
        assert!(names.contains(&"execute_vm_command"));
    }

    #[test]
    fn vm_tools_require_node_and_vmid() {
        let schema = Tool::StartVm.parameters();
        assert_eq!(schema["required"], json!(["node", "vmid"]));
    }

    #[test]
    fn vmid_accepts_integer() {
        let args: VmArgs = parse(json!({"node": "pve1", "vmid": 100})).unwrap();
        let (_, vmid) = args.ids().unwrap();
        assert_eq!(vmid.as_str(), "100");
    }

    #[test]
    fn vmid_rejects_other_types() {
        let err = parse::<VmArgs>(json!({"node": "pve1", "vmid": 1.5})).unwrap_err();
        assert_eq!(err.code(), "bad_request");
    }

    #[test]
    fn create_args_apply_defaults() {
        let args: CreateArgs =
            parse(json!({"node": "pve1", "vmid": "999", "name": "test-vm"})).unwrap();
        let request = args.into_request().unwrap();
        assert_eq!(request.memory, 512);
        assert_eq!(request.cores, 1);

        let args: CreateArgs = parse(
            json!({"node": "pve1", "vmid": 999, "name": "big", "memory": 4096, "cores": 4}),
        )
        .unwrap();
        let request = args.into_request().unwrap();
        assert_eq!(request.memory, 4096);
        assert_eq!(request.cores, 4);
    }

    #[test]
    fn empty_node_is_bad_request() {
        let args: VmArgs = parse(json!({"node": "", "vmid": "100"})).unwrap();
        let err = args.ids().unwrap_err();
        assert_eq!(err.code(), "bad_request");
    }
}
