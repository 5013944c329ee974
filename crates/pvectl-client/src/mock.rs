//! In-memory hypervisor double for tests.
//!
//! `MockHypervisor` keeps a small model of nodes, VMs and containers, applies
//! lifecycle actions to it, and records every call so tests can assert which
//! remote operations were (or were not) issued.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use pvectl_core::{NodeName, VmId};
use serde_json::{json, Value};

use crate::client::HypervisorClient;
use crate::error::{RemoteError, Result};
use crate::guest::{CommandOutput, GuestAgent};
use crate::types::{
    ClusterStatusEntry, ContainerConfig, ContainerEntry, CpuInfo, MemoryInfo, NodeEntry,
    NodeStatus, StorageEntry, VmConfig, VmCreateSpec, VmEntry, VmStatus,
};

/// Remote operations, as recorded by [`MockHypervisor::calls`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum RemoteOp {
    ReadStatus,
    Start,
    Stop,
    Shutdown,
    Reboot,
    Delete,
    Create,
    ListNodes,
    NodeStatus,
    ListVms,
    ReadConfig,
    ListContainers,
    ReadContainerConfig,
    ListStorage,
    ClusterStatus,
    Execute,
}

impl RemoteOp {
    /// Returns true for operations that change remote state.
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        matches!(
            self,
            Self::Start | Self::Stop | Self::Shutdown | Self::Reboot | Self::Delete | Self::Create
        )
    }
}

/// A recorded remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    /// Which operation was invoked.
    pub op: RemoteOp,
    /// Node addressed, if any.
    pub node: Option<String>,
    /// VM or container addressed, if any.
    pub target: Option<String>,
}

#[derive(Debug, Clone)]
struct MockGuest {
    name: String,
    status: String,
    cores: Option<u32>,
    mem: u64,
    maxmem: u64,
    template: Option<bool>,
}

#[derive(Debug, Default)]
struct State {
    nodes: Listing<Option<NodeEntry>>,
    vms: Listing<Listing<MockGuest>>,
    containers: Listing<Listing<MockGuest>>,
    storage: Listing<Vec<StorageEntry>>,
    cluster: Vec<ClusterStatusEntry>,
    failures: HashMap<(RemoteOp, Option<String>), String>,
    ack: Option<Value>,
    exec_output: Option<CommandOutput>,
    calls: Vec<RemoteCall>,
    created: Vec<VmCreateSpec>,
}

/// Keyed entries kept in insertion order, so listings come back in the order
/// tests registered them.
#[derive(Debug, Clone)]
struct Listing<V>(Vec<(String, V)>);

impl<V> Default for Listing<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> Listing<V> {
    fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.0.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replace in place when the key exists, otherwise append.
    fn insert(&mut self, key: String, value: V) {
        match self.get_mut(&key) {
            Some(slot) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    fn get_or_insert_with(&mut self, key: &str, make: impl FnOnce() -> V) -> &mut V {
        let idx = match self.0.iter().position(|(k, _)| k == key) {
            Some(idx) => idx,
            None => {
                self.0.push((key.to_string(), make()));
                self.0.len() - 1
            }
        };
        &mut self.0[idx].1
    }

    fn remove(&mut self, key: &str) -> Option<V> {
        let idx = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(idx).1)
    }

    fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.0.iter().map(|(k, v)| (k, v))
    }
}

/// Hypervisor double implementing both [`HypervisorClient`] and [`GuestAgent`].
#[derive(Debug, Default)]
pub struct MockHypervisor {
    state: Mutex<State>,
}

impl MockHypervisor {
    /// Create an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an online node.
    #[must_use]
    pub fn with_node(self, node: &str) -> Self {
        self.state.lock().nodes.get_or_insert_with(node, || None);
        self
    }

    /// Add a node with a specific listing entry.
    #[must_use]
    pub fn with_node_entry(self, entry: NodeEntry) -> Self {
        self.state
            .lock()
            .nodes
            .insert(entry.node.clone(), Some(entry));
        self
    }

    /// Add a VM with 2 cores and 2 GiB of memory.
    #[must_use]
    pub fn with_vm(self, node: &str, vmid: &str, name: &str, status: &str) -> Self {
        self.with_vm_cores(node, vmid, name, status, Some(2))
    }

    /// Add a VM with an explicit core count; `None` omits `cores` from its config.
    #[must_use]
    pub fn with_vm_cores(
        self,
        node: &str,
        vmid: &str,
        name: &str,
        status: &str,
        cores: Option<u32>,
    ) -> Self {
        {
            let mut state = self.state.lock();
            state.nodes.get_or_insert_with(node, || None);
            state
                .vms
                .get_or_insert_with(node, Listing::default)
                .insert(vmid.to_string(), guest(name, status, cores, None));
        }
        self
    }

    /// Add a container.
    #[must_use]
    pub fn with_container(
        self,
        node: &str,
        vmid: &str,
        name: &str,
        status: &str,
        template: bool,
    ) -> Self {
        self.with_container_template(node, vmid, name, status, Some(template))
    }

    /// Add a container; `None` omits `template` from its config.
    #[must_use]
    pub fn with_container_template(
        self,
        node: &str,
        vmid: &str,
        name: &str,
        status: &str,
        template: Option<bool>,
    ) -> Self {
        {
            let mut state = self.state.lock();
            state.nodes.get_or_insert_with(node, || None);
            state
                .containers
                .get_or_insert_with(node, Listing::default)
                .insert(vmid.to_string(), guest(name, status, Some(1), template));
        }
        self
    }

    /// Add a storage pool to a node.
    #[must_use]
    pub fn with_storage(self, node: &str, entry: StorageEntry) -> Self {
        {
            let mut state = self.state.lock();
            state.nodes.get_or_insert_with(node, || None);
            state.storage.get_or_insert_with(node, Vec::new).push(entry);
        }
        self
    }

    /// Set the `/cluster/status` response.
    #[must_use]
    pub fn with_cluster_status(self, entries: Vec<ClusterStatusEntry>) -> Self {
        self.state.lock().cluster = entries;
        self
    }

    /// Make every call of `op` fail with an API error carrying `message`.
    #[must_use]
    pub fn failing(self, op: RemoteOp, message: &str) -> Self {
        self.state
            .lock()
            .failures
            .insert((op, None), message.to_string());
        self
    }

    /// Make calls of `op` addressing `target` (a node or vmid) fail.
    ///
    /// For node-scoped listings the target is the node name; for guest-scoped
    /// operations it is the vmid.
    #[must_use]
    pub fn failing_for(self, op: RemoteOp, target: &str, message: &str) -> Self {
        self.state
            .lock()
            .failures
            .insert((op, Some(target.to_string())), message.to_string());
        self
    }

    /// Replace the acknowledgement returned by lifecycle actions.
    #[must_use]
    pub fn with_action_ack(self, ack: Value) -> Self {
        self.state.lock().ack = Some(ack);
        self
    }

    /// Set the result of guest command execution.
    #[must_use]
    pub fn with_exec_output(self, output: CommandOutput) -> Self {
        self.state.lock().exec_output = Some(output);
        self
    }

    /// All calls made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().calls.clone()
    }

    /// Operations invoked so far, in order.
    #[must_use]
    pub fn ops(&self) -> Vec<RemoteOp> {
        self.state.lock().calls.iter().map(|c| c.op).collect()
    }

    /// Returns true if any state-changing operation was issued.
    #[must_use]
    pub fn mutated(&self) -> bool {
        self.state.lock().calls.iter().any(|c| c.op.is_mutating())
    }

    /// Specs passed to `create_vm`.
    #[must_use]
    pub fn created_specs(&self) -> Vec<VmCreateSpec> {
        self.state.lock().created.clone()
    }

    /// Current status of a VM in the model.
    #[must_use]
    pub fn vm_status(&self, node: &str, vmid: &str) -> Option<String> {
        self.state
            .lock()
            .vms
            .get(node)
            .and_then(|vms| vms.get(vmid))
            .map(|vm| vm.status.clone())
    }

    fn record(&self, op: RemoteOp, node: Option<&str>, target: Option<&str>) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall {
            op,
            node: node.map(str::to_string),
            target: target.map(str::to_string),
        });

        let scoped = target
            .or(node)
            .and_then(|t| state.failures.get(&(op, Some(t.to_string()))));
        match scoped.or_else(|| state.failures.get(&(op, None))) {
            Some(message) => Err(RemoteError::api(500, message.clone())),
            None => Ok(()),
        }
    }

    fn ack(&self, node: &NodeName, vmid: &VmId, task: &str) -> Value {
        self.state.lock().ack.clone().unwrap_or_else(|| {
            json!(format!(
                "UPID:{node}:0000A1B2:00C3D4E5:65000000:{task}:{vmid}:root@pam:"
            ))
        })
    }

    fn transition(
        &self,
        op: RemoteOp,
        node: &NodeName,
        vmid: &VmId,
        task: &str,
        status: &str,
    ) -> Result<Value> {
        self.record(op, Some(node.as_str()), Some(vmid.as_str()))?;
        {
            let mut state = self.state.lock();
            let vm = state
                .vms
                .get_mut(node.as_str())
                .and_then(|vms| vms.get_mut(vmid.as_str()))
                .ok_or_else(|| missing_vm(node, vmid))?;
            vm.status = status.to_string();
        }
        Ok(self.ack(node, vmid, task))
    }
}

fn guest(name: &str, status: &str, cores: Option<u32>, template: Option<bool>) -> MockGuest {
    MockGuest {
        name: name.to_string(),
        status: status.to_string(),
        cores,
        mem: if status == "running" { 1 << 30 } else { 0 },
        maxmem: 2 << 30,
        template,
    }
}

fn missing_vm(node: &NodeName, vmid: &VmId) -> RemoteError {
    RemoteError::api(
        500,
        format!("Configuration file 'nodes/{node}/qemu-server/{vmid}.conf' does not exist"),
    )
}

fn missing_container(node: &NodeName, vmid: &VmId) -> RemoteError {
    RemoteError::api(
        500,
        format!("Configuration file 'nodes/{node}/lxc/{vmid}.conf' does not exist"),
    )
}

#[async_trait]
impl HypervisorClient for MockHypervisor {
    async fn read_status(&self, node: &NodeName, vmid: &VmId) -> Result<VmStatus> {
        self.record(RemoteOp::ReadStatus, Some(node.as_str()), Some(vmid.as_str()))?;
        let state = self.state.lock();
        let vm = state
            .vms
            .get(node.as_str())
            .and_then(|vms| vms.get(vmid.as_str()))
            .ok_or_else(|| missing_vm(node, vmid))?;
        Ok(VmStatus {
            status: vm.status.clone(),
            name: Some(vm.name.clone()),
            qmpstatus: Some(vm.status.clone()),
            uptime: None,
            lock: None,
        })
    }

    async fn start_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value> {
        self.transition(RemoteOp::Start, node, vmid, "qmstart", "running")
    }

    async fn stop_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value> {
        self.transition(RemoteOp::Stop, node, vmid, "qmstop", "stopped")
    }

    async fn shutdown_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value> {
        self.transition(RemoteOp::Shutdown, node, vmid, "qmshutdown", "stopped")
    }

    async fn reboot_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value> {
        self.transition(RemoteOp::Reboot, node, vmid, "qmreboot", "running")
    }

    async fn delete_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value> {
        self.record(RemoteOp::Delete, Some(node.as_str()), Some(vmid.as_str()))?;
        self.state
            .lock()
            .vms
            .get_mut(node.as_str())
            .and_then(|vms| vms.remove(vmid.as_str()))
            .ok_or_else(|| missing_vm(node, vmid))?;
        Ok(self.ack(node, vmid, "qmdestroy"))
    }

    async fn create_vm(&self, node: &NodeName, spec: &VmCreateSpec) -> Result<Value> {
        self.record(RemoteOp::Create, Some(node.as_str()), Some(&spec.vmid))?;
        {
            let mut state = self.state.lock();
            state.created.push(spec.clone());
            let vms = state.vms.get_or_insert_with(node.as_str(), Listing::default);
            if vms.contains_key(&spec.vmid) {
                return Err(RemoteError::api(
                    500,
                    format!("unable to create VM {} - VM {} already exists", spec.vmid, spec.vmid),
                ));
            }
            vms.insert(
                spec.vmid.clone(),
                guest(&spec.name, "stopped", Some(spec.cores), None),
            );
        }
        let vmid = VmId::new(spec.vmid.clone()).map_err(|e| RemoteError::api(400, e.to_string()))?;
        Ok(self.ack(node, &vmid, "qmcreate"))
    }

    async fn list_nodes(&self) -> Result<Vec<NodeEntry>> {
        self.record(RemoteOp::ListNodes, None, None)?;
        let state = self.state.lock();
        Ok(state
            .nodes
            .iter()
            .map(|(name, entry)| {
                entry.clone().unwrap_or_else(|| NodeEntry {
                    node: name.clone(),
                    status: Some("online".to_string()),
                    cpu: Some(0.05),
                    maxcpu: Some(8),
                    mem: Some(4 << 30),
                    maxmem: Some(16 << 30),
                    uptime: Some(86_400),
                })
            })
            .collect())
    }

    async fn node_status(&self, node: &NodeName) -> Result<NodeStatus> {
        self.record(RemoteOp::NodeStatus, Some(node.as_str()), None)?;
        if !self.state.lock().nodes.contains_key(node.as_str()) {
            return Err(RemoteError::api(500, format!("hostname lookup '{node}' failed")));
        }
        Ok(NodeStatus {
            uptime: Some(86_400),
            cpu: Some(0.05),
            cpuinfo: Some(CpuInfo {
                model: Some("AMD EPYC 7302P".to_string()),
                cpus: Some(8),
            }),
            memory: Some(MemoryInfo {
                used: 4 << 30,
                total: 16 << 30,
            }),
            loadavg: vec!["0.10".into(), "0.20".into(), "0.30".into()],
            kversion: Some("Linux 6.8.12-4-pve".to_string()),
            pveversion: Some("pve-manager/8.3.0".to_string()),
        })
    }

    async fn list_vms(&self, node: &NodeName) -> Result<Vec<VmEntry>> {
        self.record(RemoteOp::ListVms, Some(node.as_str()), None)?;
        let state = self.state.lock();
        Ok(state
            .vms
            .get(node.as_str())
            .map(|vms| {
                vms.iter()
                    .map(|(vmid, vm)| VmEntry {
                        vmid: vmid.clone(),
                        name: vm.name.clone(),
                        status: vm.status.clone(),
                        mem: vm.mem,
                        maxmem: vm.maxmem,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn read_config(&self, node: &NodeName, vmid: &VmId) -> Result<VmConfig> {
        self.record(RemoteOp::ReadConfig, Some(node.as_str()), Some(vmid.as_str()))?;
        let state = self.state.lock();
        let vm = state
            .vms
            .get(node.as_str())
            .and_then(|vms| vms.get(vmid.as_str()))
            .ok_or_else(|| missing_vm(node, vmid))?;
        Ok(VmConfig {
            cores: vm.cores,
            sockets: Some(1),
            name: Some(vm.name.clone()),
        })
    }

    async fn list_containers(&self, node: &NodeName) -> Result<Vec<ContainerEntry>> {
        self.record(RemoteOp::ListContainers, Some(node.as_str()), None)?;
        let state = self.state.lock();
        Ok(state
            .containers
            .get(node.as_str())
            .map(|cts| {
                cts.iter()
                    .map(|(vmid, ct)| ContainerEntry {
                        vmid: vmid.clone(),
                        name: ct.name.clone(),
                        status: ct.status.clone(),
                        mem: ct.mem,
                        maxmem: ct.maxmem,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn read_container_config(
        &self,
        node: &NodeName,
        vmid: &VmId,
    ) -> Result<ContainerConfig> {
        self.record(
            RemoteOp::ReadContainerConfig,
            Some(node.as_str()),
            Some(vmid.as_str()),
        )?;
        let state = self.state.lock();
        let ct = state
            .containers
            .get(node.as_str())
            .and_then(|cts| cts.get(vmid.as_str()))
            .ok_or_else(|| missing_container(node, vmid))?;
        Ok(ContainerConfig {
            cores: ct.cores,
            template: ct.template,
        })
    }

    async fn list_storage(&self, node: &NodeName) -> Result<Vec<StorageEntry>> {
        self.record(RemoteOp::ListStorage, Some(node.as_str()), None)?;
        Ok(self
            .state
            .lock()
            .storage
            .get(node.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn cluster_status(&self) -> Result<Vec<ClusterStatusEntry>> {
        self.record(RemoteOp::ClusterStatus, None, None)?;
        Ok(self.state.lock().cluster.clone())
    }
}

#[async_trait]
impl GuestAgent for MockHypervisor {
    async fn execute(&self, node: &NodeName, vmid: &VmId, command: &str) -> Result<CommandOutput> {
        self.record(RemoteOp::Execute, Some(node.as_str()), Some(vmid.as_str()))?;
        Ok(self
            .state
            .lock()
            .exec_output
            .clone()
            .unwrap_or_else(|| CommandOutput {
                success: true,
                output: format!("{command}\n"),
                error: None,
            }))
    }
}
