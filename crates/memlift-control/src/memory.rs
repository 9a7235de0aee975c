//! In-memory control plane for tests.
//!
//! Holds services and task definitions in a map, records every call, and
//! can be told to fail specific operations.
//!
//! ## Limitations
//!
//! - Task definitions are looked up by exact arn only
//! - Service updates apply immediately; there are no deployments
//! - Registered arns use a fixed account and region

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use memlift_core::{RegisterTaskDefinition, ServiceDescription, ServiceUpdate, TaskDefinitionSnapshot};

use crate::client::ControlPlane;
use crate::error::{ControlPlaneError, ControlPlaneResult};

const ARN_PREFIX: &str = "arn:aws:ecs:us-east-1:000000000000";

/// A control-plane operation, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DescribeService,
    DescribeTaskDefinition,
    RegisterTaskDefinition,
    UpdateService,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Self::DescribeService => "DescribeServices",
            Self::DescribeTaskDefinition => "DescribeTaskDefinition",
            Self::RegisterTaskDefinition => "RegisterTaskDefinition",
            Self::UpdateService => "UpdateService",
        }
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPlaneCall {
    DescribeService { cluster: String, service: String },
    DescribeTaskDefinition { arn: String },
    RegisterTaskDefinition(RegisterTaskDefinition),
    UpdateService(ServiceUpdate),
}

impl ControlPlaneCall {
    /// Whether the call changes control-plane state.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::RegisterTaskDefinition(_) | Self::UpdateService(_))
    }
}

#[derive(Debug, Default)]
struct FakeState {
    services: HashMap<(String, String), ServiceDescription>,
    task_definitions: HashMap<String, TaskDefinitionSnapshot>,
    calls: Vec<ControlPlaneCall>,
    failing: HashSet<Operation>,
}

/// In-memory [`ControlPlane`].
#[derive(Debug, Default)]
pub struct InMemoryControlPlane {
    state: Mutex<FakeState>,
}

impl InMemoryControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace a service in `cluster`.
    pub fn insert_service(&self, cluster: &str, service: ServiceDescription) {
        self.lock()
            .services
            .insert((cluster.to_string(), service.service_name.clone()), service);
    }

    /// Add or replace a task definition, keyed by its arn.
    pub fn insert_task_definition(&self, snapshot: TaskDefinitionSnapshot) {
        self.lock()
            .task_definitions
            .insert(snapshot.task_definition_arn.clone(), snapshot);
    }

    /// Make every subsequent call of `operation` fail.
    pub fn fail(&self, operation: Operation) {
        self.lock().failing.insert(operation);
    }

    /// Stop failing `operation`.
    pub fn recover(&self, operation: Operation) {
        self.lock().failing.remove(&operation);
    }

    pub fn service(&self, cluster: &str, service: &str) -> Option<ServiceDescription> {
        self.lock()
            .services
            .get(&(cluster.to_string(), service.to_string()))
            .cloned()
    }

    pub fn task_definition(&self, arn: &str) -> Option<TaskDefinitionSnapshot> {
        self.lock().task_definitions.get(arn).cloned()
    }

    /// Every call received, in order.
    pub fn calls(&self) -> Vec<ControlPlaneCall> {
        self.lock().calls.clone()
    }

    /// Only the calls that mutate state.
    pub fn mutations(&self) -> Vec<ControlPlaneCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    /// Service updates received, in order.
    pub fn service_updates(&self) -> Vec<ServiceUpdate> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                ControlPlaneCall::UpdateService(update) => Some(update.clone()),
                _ => None,
            })
            .collect()
    }

    /// Record `call`, then fail if `operation` is marked failing.
    fn record(&self, operation: Operation, call: ControlPlaneCall) -> ControlPlaneResult<MutexGuard<'_, FakeState>> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.failing.contains(&operation) {
            return Err(ControlPlaneError::Api {
                operation: operation.name(),
                status: 400,
                code: "ClientException".to_string(),
                message: format!("injected {} failure", operation.name()),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl ControlPlane for InMemoryControlPlane {
    async fn describe_service(
        &self,
        cluster: &str,
        service: &str,
    ) -> ControlPlaneResult<Option<ServiceDescription>> {
        let state = self.record(
            Operation::DescribeService,
            ControlPlaneCall::DescribeService {
                cluster: cluster.to_string(),
                service: service.to_string(),
            },
        )?;
        Ok(state
            .services
            .get(&(cluster.to_string(), service.to_string()))
            .cloned())
    }

    async fn describe_task_definition(&self, arn: &str) -> ControlPlaneResult<TaskDefinitionSnapshot> {
        let state = self.record(
            Operation::DescribeTaskDefinition,
            ControlPlaneCall::DescribeTaskDefinition {
                arn: arn.to_string(),
            },
        )?;
        state
            .task_definitions
            .get(arn)
            .cloned()
            .ok_or_else(|| ControlPlaneError::NotFound(format!("task definition {arn}")))
    }

    async fn register_task_definition(
        &self,
        request: &RegisterTaskDefinition,
    ) -> ControlPlaneResult<TaskDefinitionSnapshot> {
        let mut state = self.record(
            Operation::RegisterTaskDefinition,
            ControlPlaneCall::RegisterTaskDefinition(request.clone()),
        )?;

        let revision = state
            .task_definitions
            .values()
            .filter(|td| td.family == request.family)
            .map(|td| td.revision)
            .max()
            .unwrap_or(0)
            + 1;
        let arn = format!("{ARN_PREFIX}:task-definition/{}:{revision}", request.family);

        let snapshot = TaskDefinitionSnapshot {
            family: request.family.clone(),
            memory: Some(request.memory.clone()),
            cpu: Some(request.cpu.clone()),
            container_definitions: request.container_definitions.clone(),
            network_mode: request.network_mode.clone(),
            requires_compatibilities: request.requires_compatibilities.clone(),
            volumes: request.volumes.clone(),
            execution_role_arn: request.execution_role_arn.clone(),
            task_role_arn: request.task_role_arn.clone(),
            task_definition_arn: arn.clone(),
            revision,
            status: Some("ACTIVE".to_string()),
            registered_at: None,
            registered_by: Some(format!("{ARN_PREFIX}:role/memlift")),
            compatibilities: request.requires_compatibilities.clone(),
            requires_attributes: Vec::new(),
            extra: request.extra.clone(),
        };
        state.task_definitions.insert(arn, snapshot.clone());
        Ok(snapshot)
    }

    async fn update_service(&self, update: &ServiceUpdate) -> ControlPlaneResult<()> {
        let mut state = self.record(
            Operation::UpdateService,
            ControlPlaneCall::UpdateService(update.clone()),
        )?;

        let key = (update.cluster.clone(), update.service.clone());
        let service = state
            .services
            .get_mut(&key)
            .ok_or_else(|| ControlPlaneError::NotFound(format!("service {}", update.service)))?;
        if let Some(task_definition) = &update.task_definition {
            service.task_definition = task_definition.clone();
        }
        if let Some(desired_count) = update.desired_count {
            service.desired_count = desired_count;
        }
        Ok(())
    }
}
