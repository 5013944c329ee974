//! Core types and utilities for pvectl.
//!
//! This crate provides the foundational types used throughout pvectl:
//!
//! - **Identifiers**: `NodeName` and `VmId`, the address of a guest
//! - **Error types**: Common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use pvectl_core::{NodeName, VmId};
//!
//! let node = NodeName::new("pve1").unwrap();
//! let vmid: VmId = "100".parse().unwrap();
//! assert_eq!(format!("{node}/{vmid}"), "pve1/100");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;

pub use error::{CoreError, Result};
pub use ids::{IdError, NodeName, VmId};
