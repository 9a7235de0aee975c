//! Notification errors.

use thiserror::Error;

use memlift_transport::TransportError;

pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("platform api base url is not configured")]
    NotConfigured,

    #[error("auth token is not a valid header value")]
    InvalidToken,

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("platform rejected notification ({status}): {body}")]
    Rejected { status: u16, body: String },
}
