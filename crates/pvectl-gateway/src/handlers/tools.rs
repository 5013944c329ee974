//! Tool catalog and tool-call endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use pvectl_control::VmControl;

use crate::error::ApiError;
use crate::state::GatewayState;
use crate::tools::{self, Tool, ToolDescriptor};

/// Response for the tool catalog.
#[derive(Debug, Serialize)]
pub struct ListToolsResponse {
    /// Every available tool.
    pub tools: Vec<ToolDescriptor>,
}

/// Response for a successful tool call.
#[derive(Debug, Serialize)]
pub struct ToolCallResponse {
    /// Name of the tool that ran.
    pub tool: &'static str,
    /// The operation's result.
    pub result: Value,
}

/// List the tool catalog.
///
/// ```text
/// GET /v1/tools
/// ```
pub async fn list_tools() -> Json<ListToolsResponse> {
    Json(ListToolsResponse {
        tools: tools::catalog(),
    })
}

/// Invoke a tool by name.
///
/// The body is the tool's argument object. An empty body is treated as `{}`.
///
/// ```text
/// POST /v1/tools/start_vm
/// {"node": "pve1", "vmid": "100"}
/// ```
pub async fn call_tool<C>(
    State(state): State<Arc<GatewayState<C>>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<ToolCallResponse>, ApiError>
where
    C: VmControl + 'static,
{
    let tool: Tool = name.parse()?;
    let args = parse_args(&body)?;

    tracing::debug!(tool = %tool, "Tool call");

    let result = tool.invoke(state.control.as_ref(), args).await?;

    Ok(Json(ToolCallResponse {
        tool: tool.name(),
        result,
    }))
}

fn parse_args(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    let args: Value =
        serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if !args.is_object() {
        return Err(ApiError::BadRequest(
            "tool arguments must be a JSON object".to_string(),
        ));
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use pvectl_client::{MockHypervisor, RemoteOp};
    use pvectl_control::VmControlService;
    use serde_json::json;

    use crate::config::GatewayConfig;
    use crate::routes::create_router;

    const UPID: &str = "UPID:pve1:00001234:0000ABCD:65000000:qmstart:100:root@pam:";

    fn server(mock: MockHypervisor) -> (TestServer, Arc<MockHypervisor>) {
        let mock = Arc::new(mock);
        let control = Arc::new(VmControlService::with_defaults(Arc::clone(&mock)));
        let state = GatewayState::new(control, GatewayConfig::default());
        let server = TestServer::new(create_router(state)).unwrap();
        (server, mock)
    }

    #[test]
    fn empty_body_is_empty_object() {
        assert_eq!(parse_args(b"").unwrap(), json!({}));
        assert_eq!(parse_args(b" \n").unwrap(), json!({}));
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = parse_args(b"[1, 2]").unwrap_err();
        assert_eq!(err.code(), "bad_request");
        let err = parse_args(b"{not json").unwrap_err();
        assert_eq!(err.code(), "bad_request");
    }

    #[tokio::test]
    async fn catalog_is_listed() {
        let (server, _) = server(MockHypervisor::new());

        let response = server.get("/v1/tools").await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: Value = response.json();
        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), Tool::ALL.len());
        assert_eq!(tools[0]["name"], "get_nodes");
        assert!(tools[0]["parameters"].is_object());
    }

    #[tokio::test]
    async fn start_vm_returns_task_handle() {
        let (server, mock) = server(
            MockHypervisor::new()
                .with_vm("pve1", "100", "web", "stopped")
                .with_action_ack(json!(UPID)),
        );

        let response = server
            .post("/v1/tools/start_vm")
            .json(&json!({"node": "pve1", "vmid": "100"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: Value = response.json();
        assert_eq!(body["tool"], "start_vm");
        assert_eq!(
            body["result"],
            json!({
                "success": true,
                "message": "VM 100 started successfully",
                "task_handle": UPID
            })
        );
        assert_eq!(mock.vm_status("pve1", "100").as_deref(), Some("running"));
    }

    #[tokio::test]
    async fn integer_vmid_is_accepted() {
        let (server, _) = server(MockHypervisor::new().with_vm("pve1", "100", "web", "running"));

        let response = server
            .post("/v1/tools/stop_vm")
            .json(&json!({"node": "pve1", "vmid": 100}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: Value = response.json();
        assert_eq!(body["result"]["message"], "VM 100 stopped successfully");
    }

    #[tokio::test]
    async fn denied_transition_is_conflict() {
        let (server, mock) =
            server(MockHypervisor::new().with_vm("pve1", "100", "web", "running"));

        let response = server
            .post("/v1/tools/start_vm")
            .json(&json!({"node": "pve1", "vmid": "100"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::CONFLICT);

        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "precondition_violation");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("already running"));
        assert!(!mock.mutated());
    }

    #[tokio::test]
    async fn remote_failure_is_bad_gateway() {
        let (server, _) = server(
            MockHypervisor::new()
                .with_vm("pve1", "100", "web", "stopped")
                .failing(RemoteOp::Start, "VM is locked (backup)"),
        );

        let response = server
            .post("/v1/tools/start_vm")
            .json(&json!({"node": "pve1", "vmid": "100"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);

        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "remote_operation_failure");
        assert_eq!(
            body["error"]["message"],
            "Failed to start VM 100: VM is locked (backup)"
        );
    }

    #[tokio::test]
    async fn missing_arguments_are_bad_request() {
        let (server, mock) = server(MockHypervisor::new());

        let response = server
            .post("/v1/tools/delete_vm")
            .json(&json!({"node": "pve1"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert!(mock.calls().is_empty());

        let response = server
            .post("/v1/tools/delete_vm")
            .json(&json!({"node": "pve1", "vmid": "  "}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let (server, _) = server(MockHypervisor::new());

        let response = server.post("/v1/tools/reset_vm").json(&json!({})).await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

        let body: Value = response.json();
        assert_eq!(body["error"]["code"], "unknown_tool");
    }

    #[tokio::test]
    async fn listing_tools_accept_empty_body() {
        let (server, _) = server(
            MockHypervisor::new()
                .with_vm("pve1", "100", "web", "running")
                .with_vm("pve1", "101", "db", "stopped"),
        );

        let response = server.post("/v1/tools/get_vms").await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: Value = response.json();
        let vms = body["result"].as_array().unwrap();
        assert_eq!(vms.len(), 2);
        assert_eq!(vms[0]["node"], "pve1");
    }

    #[tokio::test]
    async fn create_vm_uses_defaults() {
        let (server, mock) = server(MockHypervisor::new().with_node("pve1"));

        let response = server
            .post("/v1/tools/create_vm")
            .json(&json!({"node": "pve1", "vmid": 999, "name": "test-vm"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);

        let body: Value = response.json();
        assert_eq!(body["result"]["success"], true);
        assert_eq!(body["result"]["vmid"], "999");

        let specs = mock.created_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].memory, 512);
        assert_eq!(specs[0].cores, 1);
    }

    #[tokio::test]
    async fn execute_on_stopped_vm_is_conflict() {
        let (server, mock) =
            server(MockHypervisor::new().with_vm("pve1", "100", "web", "stopped"));

        let response = server
            .post("/v1/tools/execute_vm_command")
            .json(&json!({"node": "pve1", "vmid": "100", "command": "uptime"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::CONFLICT);
        assert!(!mock.ops().contains(&RemoteOp::Execute));
    }
}
