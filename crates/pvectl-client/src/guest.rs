//! Guest command execution through the QEMU guest agent.

use async_trait::async_trait;
use pvectl_core::{NodeName, VmId};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Outcome of a command run inside a guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// True if the command exited with status 0.
    pub success: bool,
    /// Captured standard output.
    pub output: String,
    /// Captured standard error, if any was produced.
    pub error: Option<String>,
}

impl CommandOutput {
    /// Build an output from an exit code and captured streams.
    #[must_use]
    pub fn from_exit(exit_code: i64, stdout: Option<String>, stderr: Option<String>) -> Self {
        Self {
            success: exit_code == 0,
            output: stdout.unwrap_or_default(),
            error: stderr.filter(|s| !s.is_empty()),
        }
    }
}

/// Runs shell commands inside a guest.
///
/// The guest agent must be installed and running in the VM; the caller is
/// responsible for checking that the VM itself is running.
#[async_trait]
pub trait GuestAgent: Send + Sync {
    /// Run `command` through `/bin/sh -c` and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent is unreachable, rejects the command, or
    /// the command does not finish in time.
    async fn execute(&self, node: &NodeName, vmid: &VmId, command: &str) -> Result<CommandOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_exit_is_success() {
        let out = CommandOutput::from_exit(0, Some("ok\n".into()), Some(String::new()));
        assert!(out.success);
        assert_eq!(out.output, "ok\n");
        assert_eq!(out.error, None);
    }

    #[test]
    fn nonzero_exit_keeps_stderr() {
        let out = CommandOutput::from_exit(127, None, Some("sh: nope: not found".into()));
        assert!(!out.success);
        assert_eq!(out.output, "");
        assert_eq!(out.error.as_deref(), Some("sh: nope: not found"));
    }
}
