//! Command-line and environment configuration.
//!
//! Settings start from an optional TOML file; every flag (or its
//! environment variable) that is present overrides the file.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, ValueEnum};

use memlift_core::ControllerConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Controller settings shared by every subcommand.
#[derive(Debug, Clone, Default, Args)]
pub struct Settings {
    /// TOML configuration file.
    #[arg(long, env = "MEMLIFT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cluster whose services are remediated.
    #[arg(long, env = "CLUSTER_NAME")]
    pub cluster: Option<String>,

    /// Control-plane region.
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// Control-plane endpoint override.
    #[arg(long, env = "ECS_ENDPOINT")]
    pub ecs_endpoint: Option<String>,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: Option<String>,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: Option<String>,

    #[arg(long, env = "AWS_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,

    /// Base URL of the platform API notified after remediation.
    #[arg(long, env = "EVALAI_API_SERVER")]
    pub api_server: Option<String>,

    /// Bearer token for the platform API.
    #[arg(long, env = "AUTH_TOKEN", hide_env_values = true)]
    pub auth_token: Option<String>,
}

impl Settings {
    /// Resolve the final configuration and validate it.
    pub fn load(&self) -> anyhow::Result<ControllerConfig> {
        let base = match &self.config {
            Some(path) => ControllerConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ControllerConfig::new(String::new()),
        };
        let config = self.apply(base);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    /// Overlay the flags that are set onto `config`.
    pub fn apply(&self, mut config: ControllerConfig) -> ControllerConfig {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        fn set_opt(target: &mut Option<String>, value: &Option<String>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        set(&mut config.cluster, &self.cluster);
        set(&mut config.region, &self.region);
        set_opt(&mut config.control_plane.endpoint, &self.ecs_endpoint);
        set_opt(&mut config.control_plane.access_key_id, &self.access_key_id);
        set_opt(&mut config.control_plane.secret_access_key, &self.secret_access_key);
        set_opt(&mut config.control_plane.session_token, &self.session_token);
        set_opt(&mut config.platform.api_base_url, &self.api_server);
        set_opt(&mut config.platform.auth_token, &self.auth_token);
        config
    }
}
