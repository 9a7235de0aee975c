//! AWS Signature Version 4 request signing.
//!
//! Signs every header present in the map at signing time, so callers must
//! insert `host` (and any `x-amz-*` headers) before calling
//! [`sign_request`].

use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue, Method};
use sha2::{Digest, Sha256};

use memlift_core::ControlPlaneConfig;
use memlift_transport::Endpoint;

use crate::error::{ControlPlaneError, ControlPlaneResult};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Static access-key credentials.
#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Credentials from config; `None` unless both key halves are set.
    pub fn from_config(config: &ControlPlaneConfig) -> Option<Self> {
        match (&config.access_key_id, &config.secret_access_key) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some(Self {
                access_key_id: id.clone(),
                secret_access_key: secret.clone(),
                session_token: config.session_token.clone().filter(|t| !t.is_empty()),
            }),
            _ => None,
        }
    }
}

/// Add `x-amz-date`, the session token (if any), and `authorization`.
///
/// The endpoint's path and query are signed as given; callers pass them
/// already normalized and URI-encoded.
#[allow(clippy::too_many_arguments)]
pub fn sign_request(
    credentials: &Credentials,
    region: &str,
    service: &str,
    method: &Method,
    endpoint: &Endpoint,
    headers: &mut HeaderMap,
    body: &[u8],
    now: DateTime<Utc>,
) -> ControlPlaneResult<()> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    headers.insert("x-amz-date", header_value(&amz_date)?);
    if let Some(token) = &credentials.session_token {
        headers.insert("x-amz-security-token", header_value(token)?);
    }

    let (canonical_headers, signed_headers) = canonical_headers(headers)?;
    let canonical_request = format!(
        "{method}\n{path}\n{query}\n{canonical_headers}\n{signed_headers}\n{payload}",
        method = method.as_str(),
        path = endpoint.path(),
        query = canonical_query(endpoint.query()),
        payload = hex::encode(Sha256::digest(body)),
    );

    let scope = format!("{date}/{region}/{service}/aws4_request");
    let string_to_sign = format!(
        "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let key = signing_key(&credentials.secret_access_key, &date, region, service)?;
    let signature = hex::encode(hmac(&key, string_to_sign.as_bytes())?);

    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
        credentials.access_key_id
    );
    headers.insert(AUTHORIZATION, header_value(&authorization)?);
    Ok(())
}

/// Lowercased, sorted `name:value\n` lines and the `;`-joined name list.
fn canonical_headers(headers: &HeaderMap) -> ControlPlaneResult<(String, String)> {
    let mut entries: Vec<(String, String)> = Vec::with_capacity(headers.len());
    for name in headers.keys() {
        let values: Vec<String> = headers
            .get_all(name)
            .iter()
            .map(|v| {
                v.to_str()
                    .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
                    .map_err(|e| ControlPlaneError::Signing(format!("header {name}: {e}")))
            })
            .collect::<Result<_, _>>()?;
        entries.push((name.as_str().to_ascii_lowercase(), values.join(",")));
    }
    entries.sort();

    let canonical = entries
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect::<String>();
    let signed = entries
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    Ok((canonical, signed))
}

/// Query parameters sorted by name then value.
fn canonical_query(query: &str) -> String {
    let mut pairs: Vec<(&str, &str)> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| p.split_once('=').unwrap_or((p, "")))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> ControlPlaneResult<Vec<u8>> {
    let k_date = hmac(format!("AWS4{secret}").as_bytes(), date.as_bytes())?;
    let k_region = hmac(&k_date, region.as_bytes())?;
    let k_service = hmac(&k_region, service.as_bytes())?;
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> ControlPlaneResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| ControlPlaneError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn header_value(value: &str) -> ControlPlaneResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ControlPlaneError::Signing(e.to_string()))
}
