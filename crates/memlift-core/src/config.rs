//! memlift.toml configuration.
//!
//! The file is optional: every field can also be supplied through the
//! daemon's flags and environment variables, which take precedence over
//! the file (see `memliftd`).

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::CpuClass;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Full controller configuration, passed to the handler at construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerConfig {
    /// Cluster whose services are remediated.
    #[serde(default)]
    pub cluster: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub stale_lookup_policy: StaleLookupPolicy,
    /// Per-request timeout for control-plane and platform calls.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Overrides the built-in tier table when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiers: Option<Vec<CpuClass>>,
}

/// Control-plane endpoint and signing credentials.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ControlPlaneConfig {
    /// Overrides the regional endpoint (e.g. a local emulator).
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl fmt::Debug for ControlPlaneConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlPlaneConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redacted(&self.secret_access_key))
            .field("session_token", &redacted(&self.session_token))
            .finish()
    }
}

/// Owning platform's API, used for best-effort notification.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct PlatformConfig {
    pub api_base_url: Option<String>,
    pub auth_token: Option<String>,
    /// Ask the platform to email challenge hosts about the change.
    #[serde(default = "default_send_email")]
    pub send_email: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            auth_token: None,
            send_email: default_send_email(),
        }
    }
}

impl fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("api_base_url", &self.api_base_url)
            .field("auth_token", &redacted(&self.auth_token))
            .field("send_email", &self.send_email)
            .finish()
    }
}

/// What the staleness guard concludes when the service's current task
/// definition cannot be determined (service missing or lookup error).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StaleLookupPolicy {
    /// Treat the event as current and remediate.
    #[default]
    FailOpen,
    /// Treat the event as stale and do nothing.
    FailClosed,
}

impl ControllerConfig {
    /// Configuration for `cluster` with every other field defaulted.
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            region: default_region(),
            control_plane: ControlPlaneConfig::default(),
            platform: PlatformConfig::default(),
            stale_lookup_policy: StaleLookupPolicy::default(),
            request_timeout_secs: default_timeout_secs(),
            tiers: None,
        }
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check fields that have no usable default.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.cluster.trim().is_empty() {
            return Err(ConfigError::Missing("cluster"));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::Missing("region"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if let Some(url) = &self.platform.api_base_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "platform.api_base_url must be an http(s) URL: {url}"
            )));
        }
        Ok(())
    }

    /// Control-plane endpoint: the explicit override, or the regional
    /// public endpoint.
    pub fn control_plane_endpoint(&self) -> String {
        match &self.control_plane.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://ecs.{}.amazonaws.com", self.region),
        }
    }
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_send_email() -> bool {
    true
}
