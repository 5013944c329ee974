//! Status guard for state-changing VM operations.
//!
//! Each operation is gated by exactly one read of the VM's live status. The
//! decision itself is a pure function of `(operation, status)`: every
//! operation has a small denylist of statuses and anything else is allowed,
//! including statuses the hypervisor may add in future.
//!
//! ```text
//!   operation   denied when              reason
//!   ---------   ----------------------   ------------------------------------------
//!   start       running                  VM {vmid} is already running
//!   stop        stopped                  VM {vmid} is already stopped
//!   shutdown    stopped                  VM {vmid} is already stopped
//!   restart     anything but running     VM {vmid} is not running (current status: s)
//!   delete      running, paused          VM {vmid} must be stopped before deletion
//!   create      status read succeeds     VM {vmid} already exists
//!   execute     anything but running     VM {vmid} is not running (current status: s)
//! ```

use pvectl_client::{HypervisorClient, VmStatus};
use pvectl_core::{NodeName, VmId};
use serde::Serialize;

use crate::error::{ControlError, Result};

/// A guarded VM operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VmOperation {
    /// Power on.
    Start,
    /// Hard stop.
    Stop,
    /// Graceful, guest-cooperative shutdown.
    Shutdown,
    /// Guest reboot.
    Restart,
    /// Permanent removal.
    Delete,
    /// Creation with a minimal configuration.
    Create,
    /// Command execution through the guest agent.
    Execute,
}

impl VmOperation {
    /// Operation-context label used when wrapping remote failures,
    /// e.g. `start VM 100`.
    #[must_use]
    pub fn context(self, vmid: &VmId) -> String {
        match self {
            Self::Start => format!("start VM {vmid}"),
            Self::Stop => format!("stop VM {vmid}"),
            Self::Shutdown => format!("shutdown VM {vmid}"),
            Self::Restart => format!("reboot VM {vmid}"),
            Self::Delete => format!("delete VM {vmid}"),
            Self::Create => format!("create VM {vmid}"),
            Self::Execute => format!("execute command on VM {vmid}"),
        }
    }
}

/// Outcome of a guard decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardResult {
    /// The operation may proceed.
    Allowed,
    /// The operation is illegal in the current status.
    Denied(String),
}

impl GuardResult {
    /// Returns true if the operation may proceed.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Decide whether `op` is legal for a VM whose status read returned `status`.
///
/// A successful read always denies `Create`: the VM already exists.
#[must_use]
pub fn evaluate(op: VmOperation, vmid: &VmId, status: &str) -> GuardResult {
    use VmOperation::{Create, Delete, Execute, Restart, Shutdown, Start, Stop};

    match (op, status) {
        (Start, "running") => GuardResult::Denied(format!("VM {vmid} is already running")),
        (Stop | Shutdown, "stopped") => {
            GuardResult::Denied(format!("VM {vmid} is already stopped"))
        }
        (Restart | Execute, s) if s != "running" => GuardResult::Denied(format!(
            "VM {vmid} is not running (current status: {s})"
        )),
        (Delete, "running" | "paused") => {
            GuardResult::Denied(format!("VM {vmid} must be stopped before deletion"))
        }
        (Create, _) => GuardResult::Denied(format!("VM {vmid} already exists")),
        _ => GuardResult::Allowed,
    }
}

/// Read the VM's status once and check that `op` is legal.
///
/// Returns the status that was read, or `None` for a `Create` whose status
/// read failed (the VM does not exist, so creation may proceed).
///
/// # Errors
///
/// - `ControlError::PreconditionViolation` if the guard denies the operation,
///   or if a `Delete` targets a VM the hypervisor reports as not found
/// - `ControlError::RemoteFailure` if the status read fails for any other
///   operation or reason
pub async fn check<C>(
    client: &C,
    node: &NodeName,
    vmid: &VmId,
    op: VmOperation,
) -> Result<Option<VmStatus>>
where
    C: HypervisorClient + ?Sized,
{
    match client.read_status(node, vmid).await {
        Ok(status) => match evaluate(op, vmid, &status.status) {
            GuardResult::Allowed => Ok(Some(status)),
            GuardResult::Denied(reason) => {
                tracing::debug!(
                    node = %node,
                    vmid = %vmid,
                    status = %status.status,
                    ?op,
                    "Operation denied by status guard"
                );
                Err(ControlError::precondition(reason))
            }
        },
        Err(_) if op == VmOperation::Create => Ok(None),
        Err(err) if op == VmOperation::Delete && err.is_not_found() => {
            Err(ControlError::precondition(format!("VM {vmid} not found")))
        }
        Err(err) => Err(ControlError::remote(op.context(vmid), err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvectl_client::{MockHypervisor, RemoteOp};

    fn vmid() -> VmId {
        VmId::new("100").unwrap()
    }

    fn node() -> NodeName {
        NodeName::new("node1").unwrap()
    }

    #[test]
    fn start_denied_only_when_running() {
        assert_eq!(
            evaluate(VmOperation::Start, &vmid(), "running"),
            GuardResult::Denied("VM 100 is already running".into())
        );
        assert!(evaluate(VmOperation::Start, &vmid(), "stopped").is_allowed());
        assert!(evaluate(VmOperation::Start, &vmid(), "paused").is_allowed());
    }

    #[test]
    fn stop_and_shutdown_denied_when_stopped() {
        for op in [VmOperation::Stop, VmOperation::Shutdown] {
            assert_eq!(
                evaluate(op, &vmid(), "stopped"),
                GuardResult::Denied("VM 100 is already stopped".into())
            );
            assert!(evaluate(op, &vmid(), "running").is_allowed());
            assert!(evaluate(op, &vmid(), "paused").is_allowed());
        }
    }

    #[test]
    fn restart_requires_running() {
        assert_eq!(
            evaluate(VmOperation::Restart, &vmid(), "paused"),
            GuardResult::Denied("VM 100 is not running (current status: paused)".into())
        );
        assert!(evaluate(VmOperation::Restart, &vmid(), "running").is_allowed());
    }

    #[test]
    fn delete_denied_when_running_or_paused() {
        for status in ["running", "paused"] {
            assert_eq!(
                evaluate(VmOperation::Delete, &vmid(), status),
                GuardResult::Denied("VM 100 must be stopped before deletion".into())
            );
        }
        assert!(evaluate(VmOperation::Delete, &vmid(), "stopped").is_allowed());
    }

    #[test]
    fn unknown_statuses_pass_denylists() {
        for op in [
            VmOperation::Start,
            VmOperation::Stop,
            VmOperation::Shutdown,
            VmOperation::Delete,
        ] {
            assert!(evaluate(op, &vmid(), "prelaunch").is_allowed());
        }
    }

    #[test]
    fn create_denied_for_any_status() {
        assert_eq!(
            evaluate(VmOperation::Create, &vmid(), "stopped"),
            GuardResult::Denied("VM 100 already exists".into())
        );
    }

    #[test]
    fn context_labels() {
        assert_eq!(VmOperation::Start.context(&vmid()), "start VM 100");
        assert_eq!(VmOperation::Restart.context(&vmid()), "reboot VM 100");
        assert_eq!(
            VmOperation::Execute.context(&vmid()),
            "execute command on VM 100"
        );
    }

    #[tokio::test]
    async fn check_reads_status_exactly_once() {
        let mock = MockHypervisor::new().with_vm("node1", "100", "web", "stopped");
        let status = check(&mock, &node(), &vmid(), VmOperation::Start)
            .await
            .unwrap();
        assert_eq!(status.map(|s| s.status).as_deref(), Some("stopped"));
        assert_eq!(mock.ops(), vec![RemoteOp::ReadStatus]);
    }

    #[tokio::test]
    async fn check_create_passes_when_read_fails() {
        let mock = MockHypervisor::new().with_node("node1");
        let status = check(&mock, &node(), &vmid(), VmOperation::Create)
            .await
            .unwrap();
        assert!(status.is_none());
    }

    #[tokio::test]
    async fn check_delete_maps_not_found_to_precondition() {
        let mock = MockHypervisor::new().with_node("node1");
        let err = check(&mock, &node(), &vmid(), VmOperation::Delete)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::PreconditionViolation(_)));
        assert_eq!(err.to_string(), "VM 100 not found");
    }

    #[tokio::test]
    async fn check_delete_other_read_failures_are_remote() {
        let mock = MockHypervisor::new()
            .with_vm("node1", "100", "web", "stopped")
            .failing(RemoteOp::ReadStatus, "Connection timeout");
        let err = check(&mock, &node(), &vmid(), VmOperation::Delete)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to delete VM 100: Connection timeout");
    }

    #[tokio::test]
    async fn check_start_on_missing_vm_is_remote_failure() {
        let mock = MockHypervisor::new().with_node("node1");
        let err = check(&mock, &node(), &vmid(), VmOperation::Start)
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::RemoteFailure { .. }));
        assert!(err.to_string().starts_with("Failed to start VM 100: "));
    }
}
