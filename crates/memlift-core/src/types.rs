//! Domain types shared by every memlift crate.
//!
//! Wire-facing types mirror the control plane's JSON shapes (camelCase,
//! string-typed `cpu`/`memory`) so they can be deserialized straight from
//! task state-change events and ECS API responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Last status value that makes an event actionable.
pub const STOPPED_STATUS: &str = "STOPPED";

/// Tag key correlating a cluster service to its owning challenge.
pub const CHALLENGE_PK_TAG: &str = "challenge_pk";

// ── Events ────────────────────────────────────────────────────────

/// Event envelope delivered by the cluster's event bus.
///
/// Only `detail` is consumed; envelope metadata (`source`, `detail-type`,
/// `time`, ...) is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterEvent {
    #[serde(default)]
    pub detail: TaskStateChange,
}

/// The `detail` payload of a task state-change event.
///
/// Every field is optional on the wire; missing values deserialize empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskStateChange {
    pub last_status: String,
    pub stopped_reason: String,
    /// `service:<name>` for service-launched tasks, `family:<name>` otherwise.
    pub group: String,
    pub task_definition_arn: String,
    pub containers: Vec<ContainerState>,
}

/// Exit state of one container inside a stopped task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerState {
    pub name: String,
    pub exit_code: Option<i32>,
}

// ── Task definitions ──────────────────────────────────────────────

/// A registered, immutable task definition revision as returned by the
/// control plane.
///
/// The trailing fields are read-only metadata assigned at registration
/// and are rejected if resubmitted; see [`RegisterTaskDefinition`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskDefinitionSnapshot {
    pub family: String,
    /// Task-level memory in MiB, as a decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    /// Task-level cpu units, as a decimal string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    pub container_definitions: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    pub requires_compatibilities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_role_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_role_arn: Option<String>,

    pub task_definition_arn: String,
    pub revision: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_by: Option<String>,
    pub compatibilities: Vec<String>,
    pub requires_attributes: Vec<Value>,

    /// Every other field (`runtimePlatform`, `ephemeralStorage`,
    /// `placementConstraints`, ...), kept verbatim so a clone does not
    /// lose settings this type does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keys the control plane assigns at registration and rejects on input.
pub const READ_ONLY_TASK_DEFINITION_FIELDS: [&str; 8] = [
    "taskDefinitionArn",
    "revision",
    "status",
    "registeredAt",
    "registeredBy",
    "deregisteredAt",
    "compatibilities",
    "requiresAttributes",
];

/// Keys [`RegisterTaskDefinition`] sets explicitly.
const MODELED_REGISTER_FIELDS: [&str; 9] = [
    "family",
    "containerDefinitions",
    "networkMode",
    "requiresCompatibilities",
    "volumes",
    "executionRoleArn",
    "taskRoleArn",
    "memory",
    "cpu",
];

impl TaskDefinitionSnapshot {
    /// Task-level memory in MiB, if present and numeric.
    pub fn memory_mb(&self) -> Option<u32> {
        self.memory.as_deref().and_then(|m| m.trim().parse().ok())
    }

    /// Task-level cpu units, if present and numeric.
    pub fn cpu_units(&self) -> Option<u32> {
        self.cpu.as_deref().and_then(|c| c.trim().parse().ok())
    }
}

/// Registration request for a new task definition revision.
///
/// Carries only the writable subset of [`TaskDefinitionSnapshot`], so a
/// clone built from a snapshot cannot resubmit read-only metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTaskDefinition {
    pub family: String,
    pub container_definitions: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires_compatibilities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_role_arn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_role_arn: Option<String>,
    pub memory: String,
    pub cpu: String,
    /// Writable fields carried over from the source revision unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RegisterTaskDefinition {
    /// Build a request that re-registers `snapshot` with new task-level
    /// memory (MiB) and cpu (units).
    pub fn resized_from(snapshot: &TaskDefinitionSnapshot, memory_mb: u32, cpu_units: u32) -> Self {
        Self {
            family: snapshot.family.clone(),
            container_definitions: snapshot.container_definitions.clone(),
            network_mode: snapshot.network_mode.clone(),
            requires_compatibilities: snapshot.requires_compatibilities.clone(),
            volumes: snapshot.volumes.clone(),
            execution_role_arn: snapshot.execution_role_arn.clone(),
            task_role_arn: snapshot.task_role_arn.clone(),
            memory: memory_mb.to_string(),
            cpu: cpu_units.to_string(),
            extra: snapshot
                .extra
                .iter()
                .filter(|(key, _)| {
                    !READ_ONLY_TASK_DEFINITION_FIELDS.contains(&key.as_str())
                        && !MODELED_REGISTER_FIELDS.contains(&key.as_str())
                })
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }
}

// ── Services ──────────────────────────────────────────────────────

/// A key/value tag attached to a control-plane resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The subset of a described service that remediation reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceDescription {
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_arn: Option<String>,
    /// Arn of the task definition the service currently deploys.
    pub task_definition: String,
    pub desired_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub tags: Vec<Tag>,
}

impl ServiceDescription {
    /// Value of the tag with the given key, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

/// A mutation applied to a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceUpdate {
    pub cluster: String,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired_count: Option<u32>,
    #[serde(default)]
    pub force_new_deployment: bool,
}

impl ServiceUpdate {
    /// Force a new deployment pinned to `task_definition`.
    pub fn redeploy(cluster: &str, service: &str, task_definition: &str) -> Self {
        Self {
            cluster: cluster.to_string(),
            service: service.to_string(),
            task_definition: Some(task_definition.to_string()),
            desired_count: None,
            force_new_deployment: true,
        }
    }

    /// Set desired count to zero, stopping every running task.
    pub fn halt(cluster: &str, service: &str) -> Self {
        Self {
            cluster: cluster.to_string(),
            service: service.to_string(),
            task_definition: None,
            desired_count: Some(0),
            force_new_deployment: false,
        }
    }

    /// Whether this update stops the service.
    pub fn is_halt(&self) -> bool {
        self.desired_count == Some(0)
    }
}

// ── Results ───────────────────────────────────────────────────────

/// Terminal result of one handler invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemediationResult {
    pub status_code: u16,
    pub body: ResponseBody,
}

impl RemediationResult {
    pub fn text(status_code: u16, body: &str) -> Self {
        Self {
            status_code,
            body: ResponseBody::Text(body.to_string()),
        }
    }
}

/// Body of a [`RemediationResult`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResponseBody {
    /// Successful escalation to a new tier.
    Resized(ResizeSummary),
    /// Structured notice, used when the tier ceiling was reached.
    Notice { message: String },
    /// Plain status text.
    Text(String),
}

/// Sizing before and after a successful escalation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResizeSummary {
    pub old_memory: u32,
    pub new_memory: u32,
    pub old_cpu: u32,
    pub new_cpu: u32,
    pub task_def_arn: String,
}

/// A tier-table row: one cpu size and the memory range valid with it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CpuClass {
    pub cpu: u32,
    pub memory_min: u32,
    pub memory_max: u32,
    pub step: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_deserializes_with_missing_fields() {
        let event: ClusterEvent = serde_json::from_value(json!({
            "detail": { "lastStatus": "STOPPED" }
        }))
        .unwrap();
        assert_eq!(event.detail.last_status, "STOPPED");
        assert!(event.detail.containers.is_empty());
        assert!(event.detail.group.is_empty());

        let empty: ClusterEvent = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty, ClusterEvent::default());
    }

    #[test]
    fn container_exit_code_may_be_null() {
        let detail: TaskStateChange = serde_json::from_value(json!({
            "containers": [
                { "name": "worker", "exitCode": 137 },
                { "name": "sidecar", "exitCode": null },
                { "name": "init" }
            ]
        }))
        .unwrap();
        assert_eq!(detail.containers[0].exit_code, Some(137));
        assert_eq!(detail.containers[1].exit_code, None);
        assert_eq!(detail.containers[2].exit_code, None);
    }

    #[test]
    fn snapshot_parses_string_resources() {
        let snap: TaskDefinitionSnapshot = serde_json::from_value(json!({
            "family": "worker",
            "memory": "2048",
            "cpu": " 512 ",
            "taskDefinitionArn": "arn:td/worker:3",
            "revision": 3
        }))
        .unwrap();
        assert_eq!(snap.memory_mb(), Some(2048));
        assert_eq!(snap.cpu_units(), Some(512));

        let bad = TaskDefinitionSnapshot {
            memory: Some("2GB".to_string()),
            ..Default::default()
        };
        assert_eq!(bad.memory_mb(), None);
        assert_eq!(bad.cpu_units(), None);
    }

    #[test]
    fn register_request_omits_read_only_fields() {
        let snap = TaskDefinitionSnapshot {
            family: "worker".to_string(),
            memory: Some("2048".to_string()),
            cpu: Some("512".to_string()),
            container_definitions: vec![json!({"name": "worker", "image": "img"})],
            network_mode: Some("awsvpc".to_string()),
            requires_compatibilities: vec!["FARGATE".to_string()],
            task_definition_arn: "arn:td/worker:3".to_string(),
            revision: 3,
            status: Some("ACTIVE".to_string()),
            registered_by: Some("arn:user".to_string()),
            compatibilities: vec!["EC2".to_string(), "FARGATE".to_string()],
            requires_attributes: vec![json!({"name": "ecs.capability.x"})],
            ..Default::default()
        };

        let req = RegisterTaskDefinition::resized_from(&snap, 3072, 1024);
        let wire = serde_json::to_value(&req).unwrap();
        let obj = wire.as_object().unwrap();

        for key in [
            "taskDefinitionArn",
            "revision",
            "status",
            "registeredAt",
            "registeredBy",
            "compatibilities",
            "requiresAttributes",
        ] {
            assert!(!obj.contains_key(key), "{key} must not be resubmitted");
        }
        assert_eq!(wire["memory"], "3072");
        assert_eq!(wire["cpu"], "1024");
        assert_eq!(wire["networkMode"], "awsvpc");
        assert_eq!(wire["containerDefinitions"][0]["name"], "worker");
    }

    #[test]
    fn unmodeled_writable_fields_survive_resize() {
        let snap: TaskDefinitionSnapshot = serde_json::from_value(json!({
            "family": "worker",
            "memory": "2048",
            "cpu": "512",
            "containerDefinitions": [{"name": "worker"}],
            "networkMode": "awsvpc",
            "requiresCompatibilities": ["FARGATE"],
            "runtimePlatform": {"cpuArchitecture": "ARM64", "operatingSystemFamily": "LINUX"},
            "ephemeralStorage": {"sizeInGiB": 100},
            "placementConstraints": [],
            "pidMode": "task",
            "taskDefinitionArn": "arn:td/worker:3",
            "revision": 3,
            "status": "ACTIVE",
            "deregisteredAt": 1.7e9
        }))
        .unwrap();
        assert!(snap.extra.contains_key("runtimePlatform"));
        assert!(!snap.extra.contains_key("taskDefinitionArn"));

        let wire = serde_json::to_value(RegisterTaskDefinition::resized_from(&snap, 3072, 512)).unwrap();

        assert_eq!(wire["runtimePlatform"]["cpuArchitecture"], "ARM64");
        assert_eq!(wire["ephemeralStorage"]["sizeInGiB"], 100);
        assert_eq!(wire["placementConstraints"], json!([]));
        assert_eq!(wire["pidMode"], "task");
        assert_eq!(wire["memory"], "3072");
        assert_eq!(wire["cpu"], "512");
        for key in READ_ONLY_TASK_DEFINITION_FIELDS {
            assert!(wire.get(key).is_none(), "{key} must not be resubmitted");
        }
    }

    #[test]
    fn stray_read_only_keys_in_extra_are_dropped() {
        let mut snap = TaskDefinitionSnapshot {
            family: "worker".to_string(),
            ..Default::default()
        };
        snap.extra.insert("registeredAt".to_string(), json!(1.7e9));
        snap.extra.insert("memory".to_string(), json!("1024"));
        snap.extra.insert("ipcMode".to_string(), json!("none"));

        let req = RegisterTaskDefinition::resized_from(&snap, 4096, 1024);
        assert_eq!(req.extra.len(), 1);
        assert_eq!(req.extra["ipcMode"], "none");
        assert_eq!(serde_json::to_value(&req).unwrap()["memory"], "4096");
    }

    #[test]
    fn service_tag_lookup() {
        let svc = ServiceDescription {
            tags: vec![Tag::new("team", "evals"), Tag::new(CHALLENGE_PK_TAG, "42")],
            ..Default::default()
        };
        assert_eq!(svc.tag(CHALLENGE_PK_TAG), Some("42"));
        assert_eq!(svc.tag("missing"), None);
    }

    #[test]
    fn result_body_shapes() {
        let text = RemediationResult::text(200, "Not an OOM event");
        assert_eq!(
            serde_json::to_value(&text).unwrap(),
            json!({"statusCode": 200, "body": "Not an OOM event"})
        );

        let notice = RemediationResult {
            status_code: 200,
            body: ResponseBody::Notice {
                message: "Max memory reached".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_value(&notice).unwrap()["body"]["message"],
            "Max memory reached"
        );

        let resized = RemediationResult {
            status_code: 200,
            body: ResponseBody::Resized(ResizeSummary {
                old_memory: 2048,
                new_memory: 3072,
                old_cpu: 512,
                new_cpu: 512,
                task_def_arn: "arn:td/worker:4".to_string(),
            }),
        };
        let back: RemediationResult =
            serde_json::from_value(serde_json::to_value(&resized).unwrap()).unwrap();
        assert_eq!(back, resized);
    }
}
