//! Task definition cloning.
//!
//! A clone keeps the workload (containers, networking, volumes, roles)
//! and only changes task-level memory and cpu. The request is built as a
//! [`RegisterTaskDefinition`], which has no slot for read-only metadata.

use tracing::{info, warn};

use memlift_control::ControlPlane;
use memlift_core::{RegisterTaskDefinition, TaskDefinitionSnapshot};

/// Describe `old_arn` and register a copy with new memory and cpu.
/// Returns the new revision's arn, or `None` if either call fails.
pub async fn clone_task_definition_with_memory(
    client: &dyn ControlPlane,
    old_arn: &str,
    new_memory: u32,
    new_cpu: u32,
) -> Option<String> {
    let snapshot = match client.describe_task_definition(old_arn).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(task_def = %old_arn, error = %e, "describe task definition failed");
            return None;
        }
    };
    clone_from_snapshot(client, &snapshot, new_memory, new_cpu).await
}

/// Register a resized copy of an already-described task definition.
pub async fn clone_from_snapshot(
    client: &dyn ControlPlane,
    snapshot: &TaskDefinitionSnapshot,
    new_memory: u32,
    new_cpu: u32,
) -> Option<String> {
    let request = RegisterTaskDefinition::resized_from(snapshot, new_memory, new_cpu);
    match client.register_task_definition(&request).await {
        Ok(registered) => {
            info!(
                family = %request.family,
                from = %snapshot.task_definition_arn,
                to = %registered.task_definition_arn,
                memory = new_memory,
                cpu = new_cpu,
                "registered resized task definition"
            );
            Some(registered.task_definition_arn)
        }
        Err(e) => {
            warn!(
                family = %request.family,
                code = e.code(),
                error = %e,
                "register task definition failed"
            );
            None
        }
    }
}
