//! Proxmox VE client for pvectl.
//!
//! This crate provides the remote-plane capabilities the orchestration core
//! depends on:
//!
//! - [`HypervisorClient`]: VM status, lifecycle actions and inventory reads
//! - [`GuestAgent`]: command execution inside a running guest
//! - [`HttpHypervisorClient`]: the reqwest-backed implementation of both
//!
//! With the `test-utils` feature, `MockHypervisor` provides an in-memory
//! double that records every call.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod guest;
pub mod http;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod mock;

pub use client::HypervisorClient;
pub use config::ClientConfig;
pub use error::{ConfigError, RemoteError, Result};
pub use guest::{CommandOutput, GuestAgent};
pub use http::HttpHypervisorClient;
pub use types::{
    ClusterStatusEntry, ContainerConfig, ContainerEntry, CpuInfo, MemoryInfo, NodeEntry,
    NodeStatus, StorageEntry, VmConfig, VmCreateSpec, VmEntry, VmStatus,
};

#[cfg(feature = "test-utils")]
pub use mock::{MockHypervisor, RemoteCall, RemoteOp};
