//! pvectl gateway entry point.
//!
//! Hypervisor credentials come from `PVE_*` variables, orchestration
//! defaults from `PVECTL_*`, and the listener from `LISTEN_ADDR` and
//! friends. See the crate docs of `pvectl-client` and `pvectl-control`.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pvectl_client::{ClientConfig, HttpHypervisorClient};
use pvectl_control::{ControlConfig, VmControlService};
use pvectl_gateway::{create_router, GatewayConfig, GatewayState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pvectl=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting pvectl gateway");

    let client_config = ClientConfig::from_env()?;
    let control_config = ControlConfig::from_env()?;
    let gateway_config = GatewayConfig::from_env()?;

    tracing::info!(
        api_url = %client_config.base_url(),
        listen_addr = %gateway_config.listen_addr,
        node_failure_policy = ?control_config.node_failure_policy,
        "Configuration loaded"
    );

    let client = Arc::new(HttpHypervisorClient::new(&client_config)?);
    let control = Arc::new(VmControlService::new(client, control_config));

    let listen_addr = gateway_config.listen_addr.clone();
    let app = create_router(GatewayState::new(control, gateway_config));

    tracing::info!(listen_addr = %listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
