//! HTTP implementation of the hypervisor capability.
//!
//! Every Proxmox response wraps its payload in `{"data": ...}`. Failures carry
//! the reason in `message` and, for parameter validation, a per-field
//! `errors` map; both are folded into [`RemoteError::Api`].

use std::time::Duration;

use async_trait::async_trait;
use pvectl_core::{NodeName, VmId};
use reqwest::{Method, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::time::Instant;

use crate::client::HypervisorClient;
use crate::config::ClientConfig;
use crate::error::{RemoteError, Result};
use crate::guest::{CommandOutput, GuestAgent};
use crate::types::{
    ClusterStatusEntry, ContainerConfig, ContainerEntry, ExecStarted, ExecStatus, NodeEntry,
    NodeStatus, StorageEntry, VmConfig, VmCreateSpec, VmEntry, VmStatus,
};

/// Proxmox VE API client authenticating with an API token.
#[derive(Clone)]
pub struct HttpHypervisorClient {
    client: reqwest::Client,
    base_url: String,
    authorization: String,
    exec_timeout: Duration,
    poll_interval: Duration,
}

impl std::fmt::Debug for HttpHypervisorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpHypervisorClient")
            .field("base_url", &self.base_url)
            .field("exec_timeout", &self.exec_timeout)
            .finish_non_exhaustive()
    }
}

impl HttpHypervisorClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Transport` if the underlying HTTP client cannot
    /// be built (e.g. the TLS backend fails to initialise).
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(5))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| RemoteError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, config))
    }

    /// Create a client around an existing reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            base_url: config.base_url(),
            authorization: config.authorization(),
            exec_timeout: config.exec_timeout(),
            poll_interval: Duration::from_millis(500),
        }
    }

    /// Override how often guest command status is polled.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Base URL of the API.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join `segments` onto the base URL, percent-encoding each one so a
    /// node or vmid can never change which resource is addressed.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| RemoteError::Transport(format!("invalid API URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| {
                RemoteError::Transport(format!("API URL {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.url(segments)?;
        self.send(Method::GET, url, None).await
    }

    async fn post<T: DeserializeOwned>(&self, segments: &[&str], body: &Value) -> Result<T> {
        let url = self.url(segments)?;
        self.send(Method::POST, url, Some(body)).await
    }

    async fn delete<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.url(segments)?;
        self.send(Method::DELETE, url, None).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<T> {
        let path = url.path().to_string();
        tracing::debug!(%method, path, "Proxmox API request");

        let mut request = self
            .client
            .request(method.clone(), url)
            .header(reqwest::header::AUTHORIZATION, &self.authorization);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let err = error_from_response(response).await;
            tracing::debug!(%method, path, status = status.as_u16(), error = %err, "Proxmox API error");
            return Err(err);
        }

        let body: Value = response.json().await?;
        let data = match body {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        };
        serde_json::from_value(data).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn action(&self, node: &NodeName, vmid: &VmId, action: &str) -> Result<Value> {
        self.post(
            &["nodes", node.as_str(), "qemu", vmid.as_str(), "status", action],
            &json!({}),
        )
        .await
    }
}

/// Error body Proxmox sends alongside a non-success status.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<Map<String, Value>>,
}

async fn error_from_response(response: Response) -> RemoteError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();

    let mut message = parsed
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty());

    if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
        let details = errors
            .iter()
            .map(|(param, reason)| match reason {
                Value::String(s) => format!("{param}: {}", s.trim()),
                other => format!("{param}: {other}"),
            })
            .collect::<Vec<_>>()
            .join(", ");
        message = Some(match message {
            Some(m) => format!("{m} ({details})"),
            None => details,
        });
    }

    let message = message.unwrap_or_else(|| {
        format!(
            "{} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("error")
        )
    });

    RemoteError::api(status.as_u16(), message)
}

#[async_trait]
impl HypervisorClient for HttpHypervisorClient {
    async fn read_status(&self, node: &NodeName, vmid: &VmId) -> Result<VmStatus> {
        self.get(&["nodes", node.as_str(), "qemu", vmid.as_str(), "status", "current"])
            .await
    }

    async fn start_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value> {
        self.action(node, vmid, "start").await
    }

    async fn stop_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value> {
        self.action(node, vmid, "stop").await
    }

    async fn shutdown_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value> {
        self.action(node, vmid, "shutdown").await
    }

    async fn reboot_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value> {
        self.action(node, vmid, "reboot").await
    }

    async fn delete_vm(&self, node: &NodeName, vmid: &VmId) -> Result<Value> {
        self.delete(&["nodes", node.as_str(), "qemu", vmid.as_str()])
            .await
    }

    async fn create_vm(&self, node: &NodeName, spec: &VmCreateSpec) -> Result<Value> {
        let body = serde_json::to_value(spec).map_err(|e| RemoteError::Decode(e.to_string()))?;
        self.post(&["nodes", node.as_str(), "qemu"], &body).await
    }

    async fn list_nodes(&self) -> Result<Vec<NodeEntry>> {
        self.get(&["nodes"]).await
    }

    async fn node_status(&self, node: &NodeName) -> Result<NodeStatus> {
        self.get(&["nodes", node.as_str(), "status"]).await
    }

    async fn list_vms(&self, node: &NodeName) -> Result<Vec<VmEntry>> {
        self.get(&["nodes", node.as_str(), "qemu"]).await
    }

    async fn read_config(&self, node: &NodeName, vmid: &VmId) -> Result<VmConfig> {
        self.get(&["nodes", node.as_str(), "qemu", vmid.as_str(), "config"])
            .await
    }

    async fn list_containers(&self, node: &NodeName) -> Result<Vec<ContainerEntry>> {
        self.get(&["nodes", node.as_str(), "lxc"]).await
    }

    async fn read_container_config(
        &self,
        node: &NodeName,
        vmid: &VmId,
    ) -> Result<ContainerConfig> {
        self.get(&["nodes", node.as_str(), "lxc", vmid.as_str(), "config"])
            .await
    }

    async fn list_storage(&self, node: &NodeName) -> Result<Vec<StorageEntry>> {
        self.get(&["nodes", node.as_str(), "storage"]).await
    }

    async fn cluster_status(&self) -> Result<Vec<ClusterStatusEntry>> {
        self.get(&["cluster", "status"]).await
    }
}

#[async_trait]
impl GuestAgent for HttpHypervisorClient {
    async fn execute(&self, node: &NodeName, vmid: &VmId, command: &str) -> Result<CommandOutput> {
        let agent = ["nodes", node.as_str(), "qemu", vmid.as_str(), "agent"];
        let started: ExecStarted = self
            .post(
                &[&agent[..], &["exec"][..]].concat(),
                &json!({ "command": ["/bin/sh", "-c", command] }),
            )
            .await?;

        tracing::debug!(node = %node, vmid = %vmid, pid = started.pid, "Guest command started");

        let deadline = Instant::now() + self.exec_timeout;
        let mut status_url = self.url(&[&agent[..], &["exec-status"][..]].concat())?;
        status_url
            .query_pairs_mut()
            .append_pair("pid", &started.pid.to_string());

        loop {
            let status: ExecStatus = self.send(Method::GET, status_url.clone(), None).await?;
            if status.exited.unwrap_or(false) {
                return Ok(CommandOutput::from_exit(
                    status.exitcode.unwrap_or(-1),
                    status.out_data,
                    status.err_data,
                ));
            }
            if Instant::now() >= deadline {
                return Err(RemoteError::Timeout(format!(
                    "command did not finish within {}s",
                    self.exec_timeout.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> ClientConfig {
        let mut config = ClientConfig::new("unused", "root@pam", "pvectl", "secret");
        config.api_url = Some(server.uri());
        config.exec_timeout_seconds = 1;
        config
    }

    fn client(server: &MockServer) -> HttpHypervisorClient {
        HttpHypervisorClient::new(&config(server))
            .unwrap()
            .with_poll_interval(Duration::from_millis(10))
    }

    fn node() -> NodeName {
        NodeName::new("pve1").unwrap()
    }

    fn vmid() -> VmId {
        VmId::new("100").unwrap()
    }

    #[tokio::test]
    async fn read_status_unwraps_data_and_sends_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nodes/pve1/qemu/100/status/current"))
            .and(header("authorization", "PVEAPIToken=root@pam!pvectl=secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"status": "running", "name": "web", "qmpstatus": "running", "uptime": 42}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let status = client(&server).read_status(&node(), &vmid()).await.unwrap();
        assert_eq!(status.status, "running");
        assert_eq!(status.name.as_deref(), Some("web"));
        assert_eq!(status.uptime, Some(42));
    }

    #[tokio::test]
    async fn ids_are_encoded_as_single_path_segments() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nodes/pve1/qemu/100%3F/status/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"status": "stopped"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/nodes/pve1/qemu/100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .expect(0)
            .mount(&server)
            .await;

        let odd = VmId::new("100?").unwrap();
        let status = client(&server).read_status(&node(), &odd).await.unwrap();
        assert_eq!(status.status, "stopped");
    }

    #[test]
    fn url_keeps_base_path_and_escapes_separators() {
        let mut config = ClientConfig::new("pve.example.com", "root@pam", "pvectl", "secret");
        config.api_url = Some("https://pve.example.com:8006/api2/json/".to_string());
        let client = HttpHypervisorClient::new(&config).unwrap();

        let url = client
            .url(&["nodes", "pve1", "qemu", "100/../101#x", "config"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://pve.example.com:8006/api2/json/nodes/pve1/qemu/100%2F..%2F101%23x/config"
        );
    }

    #[tokio::test]
    async fn start_returns_upid_acknowledgement() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/nodes/pve1/qemu/100/status/start"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": "UPID:pve1:0000A1B2:00C3D4E5:65000000:qmstart:100:root@pam:"
            })))
            .mount(&server)
            .await;

        let ack = client(&server).start_vm(&node(), &vmid()).await.unwrap();
        assert_eq!(
            ack,
            json!("UPID:pve1:0000A1B2:00C3D4E5:65000000:qmstart:100:root@pam:")
        );
    }

    #[tokio::test]
    async fn null_data_is_accepted_for_actions() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/nodes/pve1/qemu/100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
            .mount(&server)
            .await;

        let ack = client(&server).delete_vm(&node(), &vmid()).await.unwrap();
        assert_eq!(ack, Value::Null);
    }

    #[tokio::test]
    async fn api_error_keeps_remote_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nodes/pve1/qemu/100/status/current"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "data": null,
                "message": "Configuration file 'nodes/pve1/qemu-server/100.conf' does not exist\n"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .read_status(&node(), &vmid())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(
            err.to_string(),
            "Configuration file 'nodes/pve1/qemu-server/100.conf' does not exist"
        );
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn parameter_errors_are_folded_into_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/nodes/pve1/qemu"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "data": null,
                "errors": {"memory": "value must have a minimum value of 16"}
            })))
            .mount(&server)
            .await;

        let spec = VmCreateSpec {
            vmid: "200".into(),
            name: "tiny".into(),
            ostype: "l26".into(),
            memory: 1,
            cores: 1,
            sockets: 1,
            scsi0: "local-zfs:1".into(),
            boot: "order=scsi0".into(),
            net0: "virtio,bridge=vmbr0".into(),
        };
        let err = client(&server).create_vm(&node(), &spec).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(
            err.to_string(),
            "memory: value must have a minimum value of 16"
        );
    }

    #[tokio::test]
    async fn empty_error_body_falls_back_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nodes"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).list_nodes().await.unwrap_err();
        assert_eq!(err.to_string(), "401 Unauthorized");
    }

    #[tokio::test]
    async fn list_vms_decodes_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nodes/pve1/qemu"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"vmid": 100, "name": "web", "status": "running", "mem": 1024, "maxmem": 4096},
                    {"vmid": 101, "status": "stopped"}
                ]
            })))
            .mount(&server)
            .await;

        let vms = client(&server).list_vms(&node()).await.unwrap();
        assert_eq!(vms.len(), 2);
        assert_eq!(vms[0].vmid, "100");
        assert_eq!(vms[1].name, "");
        assert_eq!(vms[1].maxmem, 0);
    }

    #[tokio::test]
    async fn guest_exec_polls_until_exit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/nodes/pve1/qemu/100/agent/exec"))
            .and(body_json(json!({"command": ["/bin/sh", "-c", "uname -a"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"pid": 7}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/nodes/pve1/qemu/100/agent/exec-status"))
            .and(query_param("pid", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"exited": 1, "exitcode": 0, "out-data": "Linux vm1\n"}
            })))
            .mount(&server)
            .await;

        let out = client(&server)
            .execute(&node(), &vmid(), "uname -a")
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.output, "Linux vm1\n");
        assert_eq!(out.error, None);
    }

    #[tokio::test]
    async fn guest_exec_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/nodes/pve1/qemu/100/agent/exec"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"pid": 9}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/nodes/pve1/qemu/100/agent/exec-status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"exited": 0}})))
            .mount(&server)
            .await;

        let err = client(&server)
            .execute(&node(), &vmid(), "sleep 600")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Timeout(_)));
    }

    #[tokio::test]
    async fn transport_error_when_unreachable() {
        let mut config = ClientConfig::new("unused", "root@pam", "pvectl", "secret");
        config.api_url = Some("http://127.0.0.1:1".into());
        let client = HttpHypervisorClient::new(&config).unwrap();

        let err = client.list_nodes().await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
    }
}
