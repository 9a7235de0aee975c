//! The control-plane capability surface used by remediation.

use async_trait::async_trait;

use memlift_core::{RegisterTaskDefinition, ServiceDescription, ServiceUpdate, TaskDefinitionSnapshot};

use crate::error::ControlPlaneResult;

/// The four control-plane operations remediation needs.
///
/// Implementations: [`EcsClient`](crate::EcsClient) against a real
/// endpoint, [`InMemoryControlPlane`](crate::InMemoryControlPlane) for
/// tests.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Describe one service, including its tags.
    ///
    /// `Ok(None)` when the cluster has no active service by that name.
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> ControlPlaneResult<Option<ServiceDescription>>;

    /// Describe a task definition by arn (or `family:revision`).
    async fn describe_task_definition(&self, arn: &str) -> ControlPlaneResult<TaskDefinitionSnapshot>;

    /// Register a new revision and return it as registered.
    async fn register_task_definition(
        &self,
        request: &RegisterTaskDefinition,
    ) -> ControlPlaneResult<TaskDefinitionSnapshot>;

    /// Apply a service update (redeploy or desired-count change).
    async fn update_service(&self, update: &ServiceUpdate) -> ControlPlaneResult<()>;
}
