//! VM lifecycle orchestration core for pvectl.
//!
//! This crate implements the logic between a caller and the hypervisor:
//!
//! - **Status guard** ([`lifecycle`]): one live status read per state-changing
//!   operation, and a pure per-operation denylist decision
//! - **Action dispatcher** ([`dispatch`]): issues the remote action and turns
//!   the acknowledgement into an optional task handle
//! - **Inventory aggregator** ([`inventory`]): node, guest and config reads
//!   with per-guest fallback
//! - **Error classifier** ([`error`]): precondition violation or remote
//!   operation failure, nothing else
//!
//! [`VmControlService`] ties them together behind the [`VmControl`] trait.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod dispatch;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod service;
pub mod types;

pub use error::{ControlError, ErrorKind, Result};
pub use lifecycle::{GuardResult, VmOperation};
pub use service::{VmControl, VmControlService};
pub use types::{
    ClusterNodeRecord, ClusterStatusRecord, ContainerRecord, ControlConfig, CreateResult,
    CreateVmRequest, Enrichment, InventoryRecord, NodeFailurePolicy, NodeRecord,
    NodeStatusRecord, OperationResult, StorageRecord, TaskHandle,
};
