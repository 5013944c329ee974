//! The hypervisor capability.
//!
//! `HypervisorClient` is the seam between orchestration logic and the remote
//! control plane. Production code talks to Proxmox over HTTP
//! ([`crate::HttpHypervisorClient`]); tests substitute an in-memory double.

use async_trait::async_trait;
use pvectl_core::{NodeName, VmId};
use serde_json::Value;

use crate::error::Result;
use crate::types::{
    ClusterStatusEntry, ContainerConfig, ContainerEntry, NodeEntry, NodeStatus, StorageEntry,
    VmConfig, VmCreateSpec, VmEntry, VmStatus,
};

/// Operations the remote control plane exposes.
///
/// Lifecycle actions return the raw acknowledgement payload. For Proxmox this
/// is usually a UPID string identifying the asynchronous task, but callers
/// must not assume any particular shape.
#[async_trait]
pub trait HypervisorClient: Send + Sync {
    /// Read the current runtime status of a VM.
    ///
    /// # Errors
    ///
    /// Returns an error if the VM does not exist or the request fails.
    async fn read_status(&self, node: &NodeName, vmid: &VmId) -> Result<VmStatus>;

    /// Request a VM start.
    ///
    /// # Errors
    ///
    /// Returns an error if the hypervisor rejects the request.
    async fn start_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value>;

    /// Request an immediate VM stop.
    ///
    /// # Errors
    ///
    /// Returns an error if the hypervisor rejects the request.
    async fn stop_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value>;

    /// Request a graceful, guest-cooperative shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the hypervisor rejects the request.
    async fn shutdown_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value>;

    /// Request a reboot.
    ///
    /// # Errors
    ///
    /// Returns an error if the hypervisor rejects the request.
    async fn reboot_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value>;

    /// Request VM deletion.
    ///
    /// # Errors
    ///
    /// Returns an error if the hypervisor rejects the request.
    async fn delete_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value>;

    /// Request creation of a VM.
    ///
    /// # Errors
    ///
    /// Returns an error if the hypervisor rejects the request.
    async fn create_vm(&self, node: &NodeName, spec: &VmCreateSpec) -> Result<Value>;

    /// List cluster nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn list_nodes(&self) -> Result<Vec<NodeEntry>>;

    /// Read detailed status of one node.
    ///
    /// # Errors
    ///
    /// Returns an error if the node is unknown or the request fails.
    async fn node_status(&self, node: &NodeName) -> Result<NodeStatus>;

    /// List VMs on a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn list_vms(&self, node: &NodeName) -> Result<Vec<VmEntry>>;

    /// Read a VM's configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the VM does not exist or the request fails.
    async fn read_config(&self, node: &NodeName, vmid: &VmId) -> Result<VmConfig>;

    /// List containers on a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn list_containers(&self, node: &NodeName) -> Result<Vec<ContainerEntry>>;

    /// Read a container's configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the container does not exist or the request fails.
    async fn read_container_config(&self, node: &NodeName, vmid: &VmId)
        -> Result<ContainerConfig>;

    /// List storage pools visible on a node.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn list_storage(&self, node: &NodeName) -> Result<Vec<StorageEntry>>;

    /// Read cluster membership and quorum.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn cluster_status(&self) -> Result<Vec<ClusterStatusEntry>>;
}
