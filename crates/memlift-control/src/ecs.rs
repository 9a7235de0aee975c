//! ECS JSON 1.1 client.
//!
//! Every operation is a `POST /` whose `x-amz-target` header names the
//! operation. Requests are SigV4-signed (service `ecs`) when credentials
//! are configured; without credentials they are sent unsigned, which
//! only local emulators and signing proxies accept.

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST};
use http::{HeaderMap, HeaderValue, Method};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use tracing::debug;

use memlift_core::{
    ControllerConfig, RegisterTaskDefinition, ServiceDescription, ServiceUpdate,
    TaskDefinitionSnapshot,
};
use memlift_transport::{Endpoint, HttpClient, HttpResponse, TransportError};

use crate::client::ControlPlane;
use crate::error::{ControlPlaneError, ControlPlaneResult};
use crate::sigv4::{Credentials, sign_request};

const TARGET_PREFIX: &str = "AmazonEC2ContainerServiceV20141113";
const CONTENT_TYPE_JSON_11: &str = "application/x-amz-json-1.1";
const SIGNING_SERVICE: &str = "ecs";

/// Control-plane client speaking the ECS JSON protocol.
pub struct EcsClient {
    http: HttpClient,
    endpoint: Endpoint,
    region: String,
    credentials: Option<Credentials>,
}

impl EcsClient {
    /// The endpoint must be a bare origin: operations always post to `/`,
    /// and the signer does not normalize or re-encode paths and queries.
    pub fn new(
        http: HttpClient,
        endpoint_url: &str,
        region: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> ControlPlaneResult<Self> {
        let endpoint = Endpoint::parse(endpoint_url)?;
        if endpoint.path() != "/" || !endpoint.query().is_empty() {
            return Err(TransportError::InvalidUrl(format!(
                "control plane endpoint must not carry a path or query: {endpoint_url}"
            ))
            .into());
        }
        Ok(Self {
            http,
            endpoint,
            region: region.into(),
            credentials,
        })
    }

    /// Client for the configured endpoint, region, and credentials.
    pub fn from_config(config: &ControllerConfig, http: HttpClient) -> ControlPlaneResult<Self> {
        Self::new(
            http,
            &config.control_plane_endpoint(),
            config.region.clone(),
            Credentials::from_config(&config.control_plane),
        )
    }

    pub fn is_signing(&self) -> bool {
        self.credentials.is_some()
    }

    /// Build the signed header set for one operation.
    fn headers(&self, operation: &str, body: &[u8]) -> ControlPlaneResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HOST,
            HeaderValue::from_str(&self.endpoint.host_header())
                .map_err(|e| ControlPlaneError::Signing(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON_11));
        headers.insert(
            "x-amz-target",
            HeaderValue::from_str(&format!("{TARGET_PREFIX}.{operation}"))
                .map_err(|e| ControlPlaneError::Signing(e.to_string()))?,
        );

        if let Some(credentials) = &self.credentials {
            sign_request(
                credentials,
                &self.region,
                SIGNING_SERVICE,
                &Method::POST,
                &self.endpoint,
                &mut headers,
                body,
                chrono::Utc::now(),
            )?;
        }
        Ok(headers)
    }

    async fn call<Req, Resp>(&self, operation: &'static str, request: &Req) -> ControlPlaneResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let body = serde_json::to_vec(request).map_err(|e| ControlPlaneError::Decode {
            operation,
            message: format!("encode request: {e}"),
        })?;
        let headers = self.headers(operation, &body)?;

        debug!(operation, host = %self.endpoint.host, "control plane call");
        let response = self.http.post(&self.endpoint, headers, Bytes::from(body)).await?;

        if !response.is_success() {
            return Err(api_error(operation, &response));
        }
        response.json().map_err(|e| ControlPlaneError::Decode {
            operation,
            message: e.to_string(),
        })
    }
}

/// Build an `Api` error from an error response body
/// (`{"__type": "...#Code", "message": "..."}`).
fn api_error(operation: &'static str, response: &HttpResponse) -> ControlPlaneError {
    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct ErrorBody {
        #[serde(rename = "__type")]
        error_type: String,
        message: Option<String>,
        #[serde(rename = "Message")]
        message_upper: Option<String>,
    }

    let parsed: ErrorBody = response.json().unwrap_or_default();
    let code = parsed
        .error_type
        .rsplit('#')
        .next()
        .filter(|c| !c.is_empty())
        .unwrap_or("UnknownError")
        .to_string();
    let message = parsed
        .message
        .or(parsed.message_upper)
        .unwrap_or_else(|| response.text());

    ControlPlaneError::Api {
        operation,
        status: response.status.as_u16(),
        code,
        message,
    }
}

// ── Wire shapes ───────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeServicesRequest<'a> {
    cluster: &'a str,
    services: [&'a str; 1],
    include: [&'static str; 1],
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct DescribeServicesResponse {
    services: Vec<ServiceDescription>,
    failures: Vec<Failure>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct Failure {
    arn: Option<String>,
    reason: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeTaskDefinitionRequest<'a> {
    task_definition: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskDefinitionResponse {
    task_definition: TaskDefinitionSnapshot,
}

#[async_trait]
impl ControlPlane for EcsClient {
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> ControlPlaneResult<Option<ServiceDescription>> {
        let response: DescribeServicesResponse = self
            .call(
                "DescribeServices",
                &DescribeServicesRequest {
                    cluster,
                    services: [service],
                    include: ["TAGS"],
                },
            )
            .await?;

        for failure in &response.failures {
            debug!(
                %cluster,
                %service,
                arn = failure.arn.as_deref().unwrap_or(""),
                reason = failure.reason.as_deref().unwrap_or(""),
                "describe services failure entry"
            );
        }

        // Deleted services linger as INACTIVE; they are no longer a match.
        Ok(response
            .services
            .into_iter()
            .find(|s| s.service_name == service && s.status.as_deref() != Some("INACTIVE")))
    }

    async fn describe_task_definition(&self, arn: &str) -> ControlPlaneResult<TaskDefinitionSnapshot> {
        let response: TaskDefinitionResponse = self
            .call(
                "DescribeTaskDefinition",
                &DescribeTaskDefinitionRequest {
                    task_definition: arn,
                },
            )
            .await?;
        Ok(response.task_definition)
    }

    async fn register_task_definition(
        &self,
        request: &RegisterTaskDefinition,
    ) -> ControlPlaneResult<TaskDefinitionSnapshot> {
        let response: TaskDefinitionResponse =
            self.call("RegisterTaskDefinition", request).await?;
        Ok(response.task_definition)
    }

    async fn update_service(&self, update: &ServiceUpdate) -> ControlPlaneResult<()> {
        let _: IgnoredAny = self.call("UpdateService", update).await?;
        Ok(())
    }
}
