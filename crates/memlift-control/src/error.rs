//! Control-plane client errors.

use thiserror::Error;

use memlift_transport::TransportError;

/// Result type alias for control-plane calls.
pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;

/// Errors returned by [`ControlPlane`](crate::ControlPlane) implementations.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("{operation} rejected ({status}): {code}: {message}")]
    Api {
        operation: &'static str,
        status: u16,
        code: String,
        message: String,
    },

    #[error("failed to decode {operation} response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl ControlPlaneError {
    /// Short error code, for structured logs.
    pub fn code(&self) -> &str {
        match self {
            Self::Transport(_) => "Transport",
            Self::Api { code, .. } => code,
            Self::Decode { .. } => "Decode",
            Self::Signing(_) => "Signing",
            Self::NotFound(_) => "NotFound",
        }
    }
}
