//! Transport errors.

use std::time::Duration;

use thiserror::Error;

pub type TransportResult<T> = Result<T, TransportError>;

/// Failures below the HTTP status line: the request never produced a
/// response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}
