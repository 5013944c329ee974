//! Orchestration service implementation.
//!
//! This module provides the `VmControl` trait, the complete operation surface
//! exposed to callers, and `VmControlService`, which composes the status
//! guard, the action dispatcher and the inventory aggregator over a
//! hypervisor client.

use std::sync::Arc;

use async_trait::async_trait;
use pvectl_client::{CommandOutput, GuestAgent, HypervisorClient};
use pvectl_core::{NodeName, VmId};

use crate::dispatch;
use crate::error::{ControlError, Result};
use crate::inventory;
use crate::lifecycle::{self, VmOperation};
use crate::types::{
    ClusterStatusRecord, ContainerRecord, ControlConfig, CreateResult, CreateVmRequest,
    InventoryRecord, NodeRecord, NodeStatusRecord, OperationResult, StorageRecord, TaskHandle,
};

/// Trait defining the orchestration operations.
///
/// Every state-changing operation reads the VM's status exactly once before
/// acting; inventory operations never consult the guard.
#[async_trait]
pub trait VmControl: Send + Sync {
    // =========================================================================
    // Lifecycle Operations
    // =========================================================================

    /// Start a VM.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::PreconditionViolation` if the VM is already running.
    async fn start_vm(&self, node: &NodeName, vmid: &VmId) -> Result<OperationResult>;

    /// Stop a VM immediately.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::PreconditionViolation` if the VM is already stopped.
    async fn stop_vm(&self, node: &NodeName, vmid: &VmId) -> Result<OperationResult>;

    /// Shut a VM down gracefully.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::PreconditionViolation` if the VM is already stopped.
    async fn shutdown_vm(&self, node: &NodeName, vmid: &VmId) -> Result<OperationResult>;

    /// Reboot a running VM.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::PreconditionViolation` if the VM is not running.
    async fn restart_vm(&self, node: &NodeName, vmid: &VmId) -> Result<OperationResult>;

    /// Create a VM with a minimal configuration.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::PreconditionViolation` if the VM already exists.
    async fn create_vm(&self, request: CreateVmRequest) -> Result<CreateResult>;

    /// Delete a stopped VM.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::PreconditionViolation` if the VM is running,
    /// paused, or not found.
    async fn delete_vm(&self, node: &NodeName, vmid: &VmId) -> Result<OperationResult>;

    /// Run a shell command inside a running VM.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::PreconditionViolation` if the VM is not running.
    async fn execute_vm_command(
        &self,
        node: &NodeName,
        vmid: &VmId,
        command: &str,
    ) -> Result<CommandOutput>;

    // =========================================================================
    // Inventory Operations
    // =========================================================================

    /// List VMs across the cluster.
    async fn get_vms(&self) -> Result<Vec<InventoryRecord>>;

    /// List LXC containers across the cluster.
    async fn get_containers(&self) -> Result<Vec<ContainerRecord>>;

    /// List cluster nodes.
    async fn get_nodes(&self) -> Result<Vec<NodeRecord>>;

    /// Read detailed status of one node.
    async fn get_node_status(&self, node: &NodeName) -> Result<NodeStatusRecord>;

    /// List storage pools across the cluster.
    async fn get_storage(&self) -> Result<Vec<StorageRecord>>;

    /// Read cluster membership and quorum.
    async fn get_cluster_status(&self) -> Result<ClusterStatusRecord>;
}

/// The orchestration service over a hypervisor client.
pub struct VmControlService<C> {
    client: Arc<C>,
    config: ControlConfig,
}

impl<C> VmControlService<C>
where
    C: HypervisorClient + GuestAgent,
{
    /// Create a new service.
    #[must_use]
    pub fn new(client: Arc<C>, config: ControlConfig) -> Self {
        Self { client, config }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(client: Arc<C>) -> Self {
        Self::new(client, ControlConfig::default())
    }

    /// Get a reference to the client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Guard, then dispatch.
    async fn transition(
        &self,
        node: &NodeName,
        vmid: &VmId,
        op: VmOperation,
    ) -> Result<OperationResult> {
        lifecycle::check(self.client.as_ref(), node, vmid, op).await?;
        let result = dispatch::dispatch(self.client.as_ref(), node, vmid, op).await?;

        tracing::info!(
            node = %node,
            vmid = %vmid,
            ?op,
            task_handle = result.task_handle.as_ref().map(TaskHandle::as_str),
            "{}",
            result.message
        );

        Ok(result)
    }
}

#[async_trait]
impl<C> VmControl for VmControlService<C>
where
    C: HypervisorClient + GuestAgent + 'static,
{
    async fn start_vm(&self, node: &NodeName, vmid: &VmId) -> Result<OperationResult> {
        self.transition(node, vmid, VmOperation::Start).await
    }

    async fn stop_vm(&self, node: &NodeName, vmid: &VmId) -> Result<OperationResult> {
        self.transition(node, vmid, VmOperation::Stop).await
    }

    async fn shutdown_vm(&self, node: &NodeName, vmid: &VmId) -> Result<OperationResult> {
        self.transition(node, vmid, VmOperation::Shutdown).await
    }

    async fn restart_vm(&self, node: &NodeName, vmid: &VmId) -> Result<OperationResult> {
        self.transition(node, vmid, VmOperation::Restart).await
    }

    async fn create_vm(&self, request: CreateVmRequest) -> Result<CreateResult> {
        lifecycle::check(
            self.client.as_ref(),
            &request.node,
            &request.vmid,
            VmOperation::Create,
        )
        .await?;

        let result = dispatch::create(self.client.as_ref(), &request, &self.config).await?;

        tracing::info!(
            node = %request.node,
            vmid = %request.vmid,
            name = %request.name,
            memory = request.memory,
            cores = request.cores,
            "Created VM"
        );

        Ok(result)
    }

    async fn delete_vm(&self, node: &NodeName, vmid: &VmId) -> Result<OperationResult> {
        self.transition(node, vmid, VmOperation::Delete).await
    }

    async fn execute_vm_command(
        &self,
        node: &NodeName,
        vmid: &VmId,
        command: &str,
    ) -> Result<CommandOutput> {
        let op = VmOperation::Execute;
        lifecycle::check(self.client.as_ref(), node, vmid, op).await?;

        let output = self
            .client
            .execute(node, vmid, command)
            .await
            .map_err(|e| ControlError::remote(op.context(vmid), e))?;

        tracing::info!(
            node = %node,
            vmid = %vmid,
            success = output.success,
            "Executed guest command"
        );

        Ok(output)
    }

    async fn get_vms(&self) -> Result<Vec<InventoryRecord>> {
        inventory::list_vms(self.client.as_ref(), self.config.node_failure_policy).await
    }

    async fn get_containers(&self) -> Result<Vec<ContainerRecord>> {
        inventory::list_containers(self.client.as_ref(), self.config.node_failure_policy).await
    }

    async fn get_nodes(&self) -> Result<Vec<NodeRecord>> {
        inventory::list_nodes(self.client.as_ref()).await
    }

    async fn get_node_status(&self, node: &NodeName) -> Result<NodeStatusRecord> {
        inventory::node_status(self.client.as_ref(), node).await
    }

    async fn get_storage(&self) -> Result<Vec<StorageRecord>> {
        inventory::list_storage(self.client.as_ref(), self.config.node_failure_policy).await
    }

    async fn get_cluster_status(&self) -> Result<ClusterStatusRecord> {
        inventory::cluster_status(self.client.as_ref()).await
    }
}
