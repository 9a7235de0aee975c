//! memlift-control — control-plane access for remediation.
//!
//! # Components
//!
//! - **`client`**: the [`ControlPlane`] trait: describe service, describe
//!   task definition, register task definition, update service
//! - **`ecs`**: [`EcsClient`], the ECS JSON 1.1 implementation
//! - **`sigv4`**: AWS Signature Version 4 signing for `ecs`
//! - **`memory`**: [`InMemoryControlPlane`], a recording fake with
//!   failure injection

pub mod client;
pub mod ecs;
pub mod error;
pub mod memory;
pub mod sigv4;

pub use client::ControlPlane;
pub use ecs::EcsClient;
pub use error::{ControlPlaneError, ControlPlaneResult};
pub use memory::{ControlPlaneCall, InMemoryControlPlane, Operation};
pub use sigv4::Credentials;
