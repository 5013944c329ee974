//! Action dispatcher.
//!
//! Issues the remote action for a transition the status guard has already
//! allowed and normalizes the acknowledgement. Remote failures are wrapped
//! with the operation context and never retried.

use pvectl_client::{HypervisorClient, VmCreateSpec};
use pvectl_core::{NodeName, VmId};

use crate::error::{ControlError, Result};
use crate::lifecycle::VmOperation;
use crate::types::{ControlConfig, CreateResult, CreateVmRequest, OperationResult, TaskHandle};

/// Invoke the remote action for `op` and build the operation result.
///
/// `Create` goes through [`create`]; passing it here is a precondition
/// violation, as is `Execute`, which has no lifecycle action.
///
/// # Errors
///
/// Returns `ControlError::RemoteFailure` if the hypervisor rejects the action.
pub async fn dispatch<C>(
    client: &C,
    node: &NodeName,
    vmid: &VmId,
    op: VmOperation,
) -> Result<OperationResult>
where
    C: HypervisorClient + ?Sized,
{
    let (ack, message) = match op {
        VmOperation::Start => (
            client.start_vm(node, vmid).await,
            format!("VM {vmid} started successfully"),
        ),
        VmOperation::Stop => (
            client.stop_vm(node, vmid).await,
            format!("VM {vmid} stopped successfully"),
        ),
        VmOperation::Shutdown => (
            client.shutdown_vm(node, vmid).await,
            format!("VM {vmid} shutdown initiated"),
        ),
        VmOperation::Restart => (
            client.reboot_vm(node, vmid).await,
            format!("VM {vmid} reboot initiated"),
        ),
        VmOperation::Delete => (
            client.delete_vm(node, vmid).await,
            format!("VM {vmid} deleted successfully"),
        ),
        VmOperation::Create | VmOperation::Execute => {
            return Err(ControlError::precondition(format!(
                "{op:?} has no lifecycle action for VM {vmid}"
            )));
        }
    };

    let ack = ack.map_err(|e| ControlError::remote(op.context(vmid), e))?;
    let task_handle = TaskHandle::from_ack(&ack);

    tracing::debug!(
        node = %node,
        vmid = %vmid,
        ?op,
        task_handle = task_handle.as_ref().map(TaskHandle::as_str),
        "Remote action accepted"
    );

    Ok(OperationResult {
        success: true,
        message,
        task_handle,
    })
}

/// Build the minimal creation spec for a request.
#[must_use]
pub fn create_spec(request: &CreateVmRequest, config: &ControlConfig) -> VmCreateSpec {
    VmCreateSpec {
        vmid: request.vmid.to_string(),
        name: request.name.clone(),
        ostype: "l26".to_string(),
        memory: request.memory,
        cores: request.cores,
        sockets: 1,
        scsi0: format!("{}:1", config.default_storage),
        boot: "order=scsi0".to_string(),
        net0: format!("virtio,bridge={}", config.default_bridge),
    }
}

/// Create a VM with the minimal spec. No task handle is tracked.
///
/// # Errors
///
/// Returns `ControlError::RemoteFailure` if the hypervisor rejects creation.
pub async fn create<C>(
    client: &C,
    request: &CreateVmRequest,
    config: &ControlConfig,
) -> Result<CreateResult>
where
    C: HypervisorClient + ?Sized,
{
    let spec = create_spec(request, config);
    client
        .create_vm(&request.node, &spec)
        .await
        .map_err(|e| ControlError::remote(VmOperation::Create.context(&request.vmid), e))?;

    Ok(CreateResult {
        success: true,
        message: format!(
            "VM {} ({}) created successfully",
            request.vmid, request.name
        ),
        vmid: request.vmid.to_string(),
    })
}
