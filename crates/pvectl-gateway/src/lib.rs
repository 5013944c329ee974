//! HTTP tool-call gateway for pvectl.
//!
//! Exposes every VM control and inventory operation as a named tool. A caller
//! lists the catalog with `GET /v1/tools` and invokes a tool with
//! `POST /v1/tools/:name`, passing the tool's arguments as a JSON object.
//!
//! Control errors keep their kind on the wire: a denied transition is
//! `409 precondition_violation`, a hypervisor failure is
//! `502 remote_operation_failure`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pvectl_client::{ClientConfig, HttpHypervisorClient};
//! use pvectl_control::VmControlService;
//! use pvectl_gateway::{create_router, GatewayConfig, GatewayState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(HttpHypervisorClient::new(&ClientConfig::from_env()?)?);
//! let control = Arc::new(VmControlService::with_defaults(client));
//!
//! let state = GatewayState::new(control, GatewayConfig::default());
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod tools;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::GatewayState;
pub use tools::{Tool, ToolDescriptor};
