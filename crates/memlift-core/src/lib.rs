//! memlift-core — shared domain types and configuration for memlift.
//!
//! Holds the wire-facing shapes exchanged with the cluster control plane
//! (task state-change events, task definitions, services), the handler's
//! result type, and the controller configuration.
//!
//! # Read-only metadata
//!
//! [`TaskDefinitionSnapshot`] mirrors what the control plane returns,
//! including registration metadata (`revision`, `status`,
//! `registeredAt`, ...). New revisions are registered through the
//! separate [`RegisterTaskDefinition`] type, which has no such fields.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ControlPlaneConfig, ControllerConfig, PlatformConfig, StaleLookupPolicy};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
