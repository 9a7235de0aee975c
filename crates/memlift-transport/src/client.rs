//! One-shot HTTP/1.1 client.
//!
//! Each request opens a fresh connection (plain TCP or rustls), performs a
//! hyper http1 handshake, sends a single request, and collects the full
//! response body. The handler issues at most a handful of calls per
//! event, so there is no connection pool.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HOST, USER_AGENT};
use http::{HeaderMap, HeaderValue, Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{TransportError, TransportResult};

const DEFAULT_USER_AGENT: &str = concat!("memlift/", env!("CARGO_PKG_VERSION"));

/// A parsed request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub tls: bool,
    pub host: String,
    pub port: u16,
    /// Origin-form path including any query, e.g. `/api/x?y=1`.
    pub path_and_query: String,
}

impl Endpoint {
    /// Parse an absolute `http://` or `https://` URL.
    pub fn parse(url: &str) -> TransportResult<Self> {
        let uri: Uri = url
            .parse()
            .map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;

        let tls = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            _ => return Err(TransportError::InvalidUrl(format!("{url}: expected http or https"))),
        };
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TransportError::InvalidUrl(format!("{url}: missing host")))?
            .to_string();
        let port = uri.port_u16().unwrap_or(if tls { 443 } else { 80 });
        let path_and_query = uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "/".to_string());

        Ok(Self {
            tls,
            host,
            port,
            path_and_query,
        })
    }

    /// Value for the `Host` header: the port is omitted when it is the
    /// scheme default.
    pub fn host_header(&self) -> String {
        let default_port = if self.tls { 443 } else { 80 };
        if self.port == default_port {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Path component without the query string.
    pub fn path(&self) -> &str {
        self.path_and_query
            .split_once('?')
            .map_or(self.path_and_query.as_str(), |(path, _)| path)
    }

    /// Query string without the leading `?`, empty when absent.
    pub fn query(&self) -> &str {
        self.path_and_query
            .split_once('?')
            .map_or("", |(_, query)| query)
    }
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Deserialize the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Body as lossy UTF-8, for log and error messages.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client with a shared TLS configuration and per-request timeout.
#[derive(Clone)]
pub struct HttpClient {
    tls: Arc<rustls::ClientConfig>,
    timeout: Duration,
    user_agent: HeaderValue,
}

impl HttpClient {
    /// Client trusting the Mozilla root store.
    pub fn new(timeout: Duration) -> TransportResult<Self> {
        Ok(Self::with_tls_config(crate::tls::webpki_client_config()?, timeout))
    }

    /// Client with a caller-provided TLS configuration.
    pub fn with_tls_config(tls: Arc<rustls::ClientConfig>, timeout: Duration) -> Self {
        Self {
            tls,
            timeout,
            user_agent: HeaderValue::from_static(DEFAULT_USER_AGENT),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST `body` to `endpoint` with the given headers.
    ///
    /// `Host` and `User-Agent` are filled in unless already present.
    /// Non-2xx statuses are returned, not treated as errors.
    pub async fn post(
        &self,
        endpoint: &Endpoint,
        headers: HeaderMap,
        body: Bytes,
    ) -> TransportResult<HttpResponse> {
        let request = self.build_request(Method::POST, endpoint, headers, body)?;

        match tokio::time::timeout(self.timeout, self.send(endpoint, request)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(host = %endpoint.host, path = %endpoint.path(), "request timed out");
                Err(TransportError::Timeout(self.timeout))
            }
        }
    }

    fn build_request(
        &self,
        method: Method,
        endpoint: &Endpoint,
        headers: HeaderMap,
        body: Bytes,
    ) -> TransportResult<Request<Full<Bytes>>> {
        let mut request = Request::builder()
            .method(method)
            .uri(endpoint.path_and_query.as_str())
            .body(Full::new(body))?;

        *request.headers_mut() = headers;
        let host = HeaderValue::from_str(&endpoint.host_header())
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", endpoint.host)))?;
        request.headers_mut().entry(HOST).or_insert(host);
        request
            .headers_mut()
            .entry(USER_AGENT)
            .or_insert_with(|| self.user_agent.clone());

        Ok(request)
    }

    async fn send(
        &self,
        endpoint: &Endpoint,
        request: Request<Full<Bytes>>,
    ) -> TransportResult<HttpResponse> {
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(TransportError::Connect)?;

        if endpoint.tls {
            let server_name = rustls::pki_types::ServerName::try_from(endpoint.host.clone())
                .map_err(|e| TransportError::Tls(format!("invalid server name {}: {e}", endpoint.host)))?;
            let connector = tokio_rustls::TlsConnector::from(Arc::clone(&self.tls));
            let tls_stream = connector
                .connect(server_name, stream)
                .await
                .map_err(|e| TransportError::Tls(e.to_string()))?;
            exchange(tls_stream, request).await
        } else {
            exchange(stream, request).await
        }
    }
}

/// Run one request/response exchange over an established stream.
async fn exchange<S>(stream: S, request: Request<Full<Bytes>>) -> TransportResult<HttpResponse>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();

    Ok(HttpResponse { status, body })
}
