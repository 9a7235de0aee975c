//! memliftd — wiring for the memlift daemon.
//!
//! Assembles a [`RemediationHandler`] from configuration (ECS client,
//! platform notifier, tier table) and exposes it over HTTP.

pub mod server;
pub mod settings;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use memlift_control::EcsClient;
use memlift_core::ControllerConfig;
use memlift_notify::HttpNotifier;
use memlift_remediate::RemediationHandler;
use memlift_transport::HttpClient;

pub use server::build_router;
pub use settings::{LogFormat, Settings};

/// Build a handler backed by the real control plane and platform API.
pub fn build_handler(config: ControllerConfig) -> anyhow::Result<RemediationHandler> {
    let http = HttpClient::new(Duration::from_secs(config.request_timeout_secs))?;

    let control = EcsClient::from_config(&config, http.clone())?;
    if !control.is_signing() {
        warn!("no control-plane credentials configured, requests will be unsigned");
    }

    let notifier = HttpNotifier::from_config(&config.platform, http);
    if config.platform.api_base_url.is_none() {
        warn!("no platform API configured, notifications will be skipped");
    }

    info!(
        cluster = %config.cluster,
        region = %config.region,
        endpoint = %config.control_plane_endpoint(),
        policy = ?config.stale_lookup_policy,
        "remediation handler configured"
    );
    let handler = RemediationHandler::new(config, Arc::new(control), Arc::new(notifier))?;
    Ok(handler)
}
