//! Client configuration.
//!
//! Connection settings for the Proxmox VE API, loaded from the environment.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Connection settings for the hypervisor API.
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    /// API host name or address.
    pub host: String,

    /// API port.
    #[serde(default = "ClientConfig::default_port")]
    pub port: u16,

    /// Full API base URL; overrides `host`/`port` when set.
    #[serde(default)]
    pub api_url: Option<String>,

    /// API user including realm (e.g. `root@pam`).
    pub user: String,

    /// API token id.
    pub token_name: String,

    /// API token secret.
    pub token_value: String,

    /// Whether to verify the server's TLS certificate.
    #[serde(default = "ClientConfig::default_verify_ssl")]
    pub verify_ssl: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "ClientConfig::default_timeout")]
    pub timeout_seconds: u64,

    /// How long to wait for a guest command to finish, in seconds.
    #[serde(default = "ClientConfig::default_exec_timeout")]
    pub exec_timeout_seconds: u64,
}

impl ClientConfig {
    const fn default_port() -> u16 {
        8006
    }

    const fn default_verify_ssl() -> bool {
        true
    }

    const fn default_timeout() -> u64 {
        30
    }

    const fn default_exec_timeout() -> u64 {
        30
    }

    /// Create a configuration with defaults for everything but credentials.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        user: impl Into<String>,
        token_name: impl Into<String>,
        token_value: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: Self::default_port(),
            api_url: None,
            user: user.into(),
            token_name: token_name.into(),
            token_value: token_value.into(),
            verify_ssl: Self::default_verify_ssl(),
            timeout_seconds: Self::default_timeout(),
            exec_timeout_seconds: Self::default_exec_timeout(),
        }
    }

    /// Load from `PVE_*` environment variables.
    ///
    /// Required: `PVE_HOST` (or `PVE_API_URL`), `PVE_USER`, `PVE_TOKEN_NAME`,
    /// `PVE_TOKEN_VALUE`. Optional: `PVE_PORT`, `PVE_VERIFY_SSL`,
    /// `PVE_TIMEOUT_SECONDS`, `PVE_EXEC_TIMEOUT_SECONDS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = std::env::var("PVE_API_URL").ok();
        let host = match std::env::var("PVE_HOST") {
            Ok(host) => host,
            Err(_) if api_url.is_some() => String::new(),
            Err(_) => return Err(ConfigError::MissingEnv("PVE_HOST")),
        };

        let mut config = Self::new(
            host,
            required("PVE_USER")?,
            required("PVE_TOKEN_NAME")?,
            required("PVE_TOKEN_VALUE")?,
        );
        config.api_url = api_url;

        if let Some(port) = parsed("PVE_PORT")? {
            config.port = port;
        }
        if let Some(verify) = optional("PVE_VERIFY_SSL") {
            config.verify_ssl = parse_bool("PVE_VERIFY_SSL", &verify)?;
        }
        if let Some(timeout) = parsed("PVE_TIMEOUT_SECONDS")? {
            config.timeout_seconds = timeout;
        }
        if let Some(timeout) = parsed("PVE_EXEC_TIMEOUT_SECONDS")? {
            config.exec_timeout_seconds = timeout;
        }

        Ok(config)
    }

    /// Base URL of the JSON API, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> String {
        match &self.api_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}:{}/api2/json", self.host, self.port),
        }
    }

    /// Value of the `Authorization` header for API token auth.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!(
            "PVEAPIToken={}!{}={}",
            self.user, self.token_name, self.token_value
        )
    }

    /// Per-request timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Guest command timeout as a `Duration`.
    #[must_use]
    pub const fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_seconds)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url())
            .field("user", &self.user)
            .field("token_name", &self.token_name)
            .field("token_value", &"<redacted>")
            .field("verify_ssl", &self.verify_ssl)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("exec_timeout_seconds", &self.exec_timeout_seconds)
            .finish()
    }
}

fn optional(var: &'static str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    optional(var).ok_or(ConfigError::MissingEnv(var))
}

fn parsed<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    optional(var)
        .map(|raw| {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new("pve.example.com", "root@pam", "pvectl", "s3cret")
    }

    #[test]
    fn defaults() {
        let config = config();
        assert_eq!(config.port, 8006);
        assert!(config.verify_ssl);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.exec_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn base_url_from_host() {
        assert_eq!(
            config().base_url(),
            "https://pve.example.com:8006/api2/json"
        );
    }

    #[test]
    fn api_url_overrides_host() {
        let mut config = config();
        config.api_url = Some("http://127.0.0.1:9000/".into());
        assert_eq!(config.base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn token_authorization_header() {
        assert_eq!(
            config().authorization(),
            "PVEAPIToken=root@pam!pvectl=s3cret"
        );
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn bool_parsing() {
        assert!(parse_bool("X", "Yes").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(matches!(
            parse_bool("X", "maybe"),
            Err(ConfigError::Invalid { var: "X", .. })
        ));
    }
}
