//! HTTP notifier for the platform's challenge API.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::debug;

use memlift_core::PlatformConfig;
use memlift_transport::{Endpoint, HttpClient};

use crate::error::{NotifyError, NotifyResult};
use crate::notifier::{PlatformNotifier, WorkerUpdate};

#[derive(Serialize)]
struct Payload<'a> {
    challenge_pk: &'a str,
    #[serde(flatten)]
    update: &'a WorkerUpdate,
}

/// Posts worker updates to
/// `{api_base_url}/api/challenges/challenge/{challenge_pk}/update_challenge_attributes/`.
pub struct HttpNotifier {
    http: HttpClient,
    api_base_url: Option<String>,
    auth_token: Option<String>,
}

impl HttpNotifier {
    pub fn new(http: HttpClient, api_base_url: Option<String>, auth_token: Option<String>) -> Self {
        Self {
            http,
            api_base_url: api_base_url.map(|u| u.trim_end_matches('/').to_string()),
            auth_token: auth_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn from_config(config: &PlatformConfig, http: HttpClient) -> Self {
        Self::new(http, config.api_base_url.clone(), config.auth_token.clone())
    }

    /// Target URL for a challenge, or `None` without a base URL.
    pub fn url_for(&self, challenge_pk: &str) -> Option<String> {
        self.api_base_url.as_ref().map(|base| {
            format!("{base}/api/challenges/challenge/{challenge_pk}/update_challenge_attributes/")
        })
    }
}

#[async_trait]
impl PlatformNotifier for HttpNotifier {
    async fn notify(&self, challenge_pk: &str, update: &WorkerUpdate) -> NotifyResult<()> {
        let url = self.url_for(challenge_pk).ok_or(NotifyError::NotConfigured)?;
        let endpoint = Endpoint::parse(&url)?;

        let body = serde_json::to_vec(&Payload {
            challenge_pk,
            update,
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| NotifyError::InvalidToken)?;
            headers.insert(AUTHORIZATION, value);
        }

        debug!(%challenge_pk, %url, "notifying platform");
        let response = self.http.post(&endpoint, headers, Bytes::from(body)).await?;
        if !response.is_success() {
            return Err(NotifyError::Rejected {
                status: response.status.as_u16(),
                body: response.text(),
            });
        }
        Ok(())
    }
}
