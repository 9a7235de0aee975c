//! Remediation handler: drives one event through the remediation state
//! machine to exactly one terminal outcome.
//!
//! ```text
//! RECEIVED ─┬─ not STOPPED / not OOM / stale ──────────────► ignored (200)
//!           ├─ no service name / no challenge_pk ──────────► rejected (400)
//!           ├─ ceiling reached ── halt ── notify ──────────► 200 "Max memory reached"
//!           └─ next tier ── CLONING ─┬─ fail ── halt ── notify ─► 500
//!                                    └─ REDEPLOYING ─┬─ fail ── halt ── notify ─► 500
//!                                                    └─ ok ── notify ──────────► 200 sizing
//! ```
//!
//! Every branch that mutates the service notifies the platform. The
//! notification result is logged and never changes the outcome.

use std::sync::Arc;

use tracing::{debug, info, warn};

use memlift_control::ControlPlane;
use memlift_core::{
    ClusterEvent, ControllerConfig, RemediationResult, ResizeSummary, ResponseBody,
    TaskDefinitionSnapshot,
};
use memlift_notify::{PlatformNotifier, WorkerUpdate, notify_evalai_api};
use memlift_planner::{ResourceTier, TierTable, TierTableError};

use crate::classify::{is_oom_event, is_stopped_event};
use crate::cloner::clone_from_snapshot;
use crate::executor::{scale_service_to_zero, update_service_with_new_task_def};
use crate::resolve::{check_freshness, get_challenge_pk_from_service, get_service_name_from_task};

pub const NOT_STOPPED: &str = "Not a STOPPED event";
pub const NOT_OOM: &str = "Not an OOM event";
pub const NO_SERVICE_NAME: &str = "Could not determine service name";
pub const STALE_EVENT: &str = "Stale OOM event";
pub const NO_CHALLENGE_PK: &str = "No challenge_pk tag found";
pub const CLONE_FAILED: &str = "Failed to register new task definition";
pub const REDEPLOY_FAILED: &str = "Failed to update service";

/// Terminal state of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NotStopped,
    NotOom,
    NoServiceName,
    Stale,
    NoChallengePk,
    /// Redeployed on a larger tier.
    Resized(ResizeSummary),
    /// Already at the top tier; the service was halted (if `halted`).
    CeilingReached { memory: u32, cpu: u32, halted: bool },
    /// No new revision could be registered.
    CloneFailed { halted: bool },
    /// The new revision was registered but the service update failed.
    RedeployFailed { new_arn: String, halted: bool },
}

impl Outcome {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotStopped | Self::NotOom | Self::Stale => 200,
            Self::NoServiceName | Self::NoChallengePk => 400,
            Self::Resized(_) | Self::CeilingReached { .. } => 200,
            Self::CloneFailed { .. } | Self::RedeployFailed { .. } => 500,
        }
    }

    /// Whether the invocation attempted to change the service.
    pub fn mutated(&self) -> bool {
        matches!(
            self,
            Self::Resized(_)
                | Self::CeilingReached { .. }
                | Self::CloneFailed { .. }
                | Self::RedeployFailed { .. }
        )
    }

    pub fn into_result(self) -> RemediationResult {
        let status_code = self.status_code();
        match self {
            Self::NotStopped => RemediationResult::text(status_code, NOT_STOPPED),
            Self::NotOom => RemediationResult::text(status_code, NOT_OOM),
            Self::NoServiceName => RemediationResult::text(status_code, NO_SERVICE_NAME),
            Self::Stale => RemediationResult::text(status_code, STALE_EVENT),
            Self::NoChallengePk => RemediationResult::text(status_code, NO_CHALLENGE_PK),
            Self::CloneFailed { .. } => RemediationResult::text(status_code, CLONE_FAILED),
            Self::RedeployFailed { .. } => RemediationResult::text(status_code, REDEPLOY_FAILED),
            Self::Resized(summary) => RemediationResult {
                status_code,
                body: ResponseBody::Resized(summary),
            },
            Self::CeilingReached {
                memory,
                cpu,
                halted,
            } => {
                let action = if halted {
                    "Service scaled to 0."
                } else {
                    "Failed to scale service to 0."
                };
                RemediationResult {
                    status_code,
                    body: ResponseBody::Notice {
                        message: format!("Max memory reached ({memory} MB / {cpu} CPU units). {action}"),
                    },
                }
            }
        }
    }
}

/// Identifies the service under remediation.
struct Target<'a> {
    service: &'a str,
    challenge_pk: &'a str,
    task_def_arn: &'a str,
}

/// Handles task-stopped events for one cluster.
pub struct RemediationHandler {
    config: ControllerConfig,
    tiers: TierTable,
    control: Arc<dyn ControlPlane>,
    notifier: Arc<dyn PlatformNotifier>,
}

impl RemediationHandler {
    /// Build a handler, validating the configured tier table (or using the
    /// default one).
    pub fn new(
        config: ControllerConfig,
        control: Arc<dyn ControlPlane>,
        notifier: Arc<dyn PlatformNotifier>,
    ) -> Result<Self, TierTableError> {
        let tiers = match &config.tiers {
            Some(classes) => TierTable::new(classes.clone())?,
            None => TierTable::default(),
        };
        Ok(Self {
            config,
            tiers,
            control,
            notifier,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    /// Run one event to its terminal result.
    pub async fn handle(&self, event: &ClusterEvent) -> RemediationResult {
        let outcome = self.evaluate(event).await;
        info!(
            status = outcome.status_code(),
            mutated = outcome.mutated(),
            "event handled"
        );
        outcome.into_result()
    }

    /// Run one event to its terminal [`Outcome`].
    pub async fn evaluate(&self, event: &ClusterEvent) -> Outcome {
        let detail = &event.detail;
        let cluster = self.config.cluster.as_str();
        let control = self.control.as_ref();

        if !is_stopped_event(detail) {
            debug!(last_status = %detail.last_status, "ignoring event: not stopped");
            return Outcome::NotStopped;
        }
        if !is_oom_event(detail) {
            debug!(reason = %detail.stopped_reason, "ignoring event: not out of memory");
            return Outcome::NotOom;
        }

        let Some(service) = get_service_name_from_task(detail) else {
            warn!(group = %detail.group, "cannot determine service name");
            return Outcome::NoServiceName;
        };
        let task_def_arn = detail.task_definition_arn.as_str();

        let freshness = check_freshness(control, cluster, &service, task_def_arn).await;
        if freshness.is_stale(self.config.stale_lookup_policy) {
            info!(
                %cluster,
                %service,
                task_def = %task_def_arn,
                ?freshness,
                "ignoring stale OOM event"
            );
            return Outcome::Stale;
        }

        let Some(challenge_pk) = get_challenge_pk_from_service(control, cluster, &service).await
        else {
            warn!(%cluster, %service, "no challenge_pk tag found");
            return Outcome::NoChallengePk;
        };

        info!(
            %cluster,
            %service,
            %challenge_pk,
            task_def = %task_def_arn,
            "worker ran out of memory"
        );

        let target = Target {
            service: &service,
            challenge_pk: &challenge_pk,
            task_def_arn,
        };
        self.remediate(&target).await
    }

    async fn remediate(&self, target: &Target<'_>) -> Outcome {
        let snapshot = match self.control.describe_task_definition(target.task_def_arn).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(task_def = %target.task_def_arn, error = %e, "describe task definition failed");
                return self.fail_clone(target, None, "task definition could not be read").await;
            }
        };

        let Some(current) = current_sizing(&snapshot) else {
            warn!(
                task_def = %target.task_def_arn,
                memory = ?snapshot.memory,
                cpu = ?snapshot.cpu,
                "task definition has no numeric task-level memory and cpu"
            );
            return self
                .fail_clone(target, None, "task definition has no task-level memory and cpu")
                .await;
        };

        let Some(next) = self.tiers.next_tier(current.memory_mb, current.cpu_units) else {
            return self.ceiling_reached(target, current).await;
        };

        info!(
            service = %target.service,
            from_memory = current.memory_mb,
            from_cpu = current.cpu_units,
            to_memory = next.memory_mb,
            to_cpu = next.cpu_units,
            "escalating worker"
        );

        let Some(new_arn) =
            clone_from_snapshot(self.control.as_ref(), &snapshot, next.memory_mb, next.cpu_units)
                .await
        else {
            return self
                .fail_clone(target, Some(current), "new task definition could not be registered")
                .await;
        };

        if !update_service_with_new_task_def(
            self.control.as_ref(),
            &self.config.cluster,
            target.service,
            &new_arn,
        )
        .await
        {
            let halted = self.halt(target).await;
            let update = WorkerUpdate::remediation_failed(
                Some((current.memory_mb, current.cpu_units)),
                target.task_def_arn,
                &format!("service could not be moved to {new_arn}"),
                self.config.platform.send_email,
            );
            self.notify(target, &update).await;
            return Outcome::RedeployFailed { new_arn, halted };
        }

        let update = WorkerUpdate::escalated(
            next.memory_mb,
            next.cpu_units,
            &new_arn,
            self.config.platform.send_email,
        );
        self.notify(target, &update).await;

        Outcome::Resized(ResizeSummary {
            old_memory: current.memory_mb,
            new_memory: next.memory_mb,
            old_cpu: current.cpu_units,
            new_cpu: next.cpu_units,
            task_def_arn: new_arn,
        })
    }

    async fn ceiling_reached(&self, target: &Target<'_>, current: ResourceTier) -> Outcome {
        warn!(
            service = %target.service,
            memory = current.memory_mb,
            cpu = current.cpu_units,
            "tier ceiling reached, halting worker"
        );
        let halted = self.halt(target).await;
        let update = WorkerUpdate::ceiling_reached(
            current.memory_mb,
            current.cpu_units,
            target.task_def_arn,
            self.config.platform.send_email,
        );
        self.notify(target, &update).await;
        Outcome::CeilingReached {
            memory: current.memory_mb,
            cpu: current.cpu_units,
            halted,
        }
    }

    async fn fail_clone(
        &self,
        target: &Target<'_>,
        current: Option<ResourceTier>,
        reason: &str,
    ) -> Outcome {
        let halted = self.halt(target).await;
        let update = WorkerUpdate::remediation_failed(
            current.map(|t| (t.memory_mb, t.cpu_units)),
            target.task_def_arn,
            reason,
            self.config.platform.send_email,
        );
        self.notify(target, &update).await;
        Outcome::CloneFailed { halted }
    }

    async fn halt(&self, target: &Target<'_>) -> bool {
        let halted =
            scale_service_to_zero(self.control.as_ref(), &self.config.cluster, target.service).await;
        if !halted {
            warn!(service = %target.service, "fail-safe halt did not apply");
        }
        halted
    }

    async fn notify(&self, target: &Target<'_>, update: &WorkerUpdate) {
        notify_evalai_api(self.notifier.as_ref(), target.challenge_pk, update).await;
    }
}

fn current_sizing(snapshot: &TaskDefinitionSnapshot) -> Option<ResourceTier> {
    Some(ResourceTier::new(snapshot.memory_mb()?, snapshot.cpu_units()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use memlift_control::InMemoryControlPlane;
    use memlift_core::CpuClass;
    use memlift_notify::RecordingNotifier;

    fn handler_with(config: ControllerConfig) -> Result<RemediationHandler, TierTableError> {
        RemediationHandler::new(
            config,
            Arc::new(InMemoryControlPlane::new()),
            Arc::new(RecordingNotifier::new()),
        )
    }

    #[test]
    fn status_codes_per_outcome() {
        assert_eq!(Outcome::NotStopped.status_code(), 200);
        assert_eq!(Outcome::Stale.status_code(), 200);
        assert_eq!(Outcome::NoServiceName.status_code(), 400);
        assert_eq!(Outcome::NoChallengePk.status_code(), 400);
        assert_eq!(Outcome::CloneFailed { halted: true }.status_code(), 500);
        assert_eq!(
            Outcome::RedeployFailed {
                new_arn: "arn".to_string(),
                halted: false
            }
            .status_code(),
            500
        );
    }

    #[test]
    fn only_remediation_branches_mutate() {
        assert!(!Outcome::NotOom.mutated());
        assert!(!Outcome::NoChallengePk.mutated());
        assert!(Outcome::CloneFailed { halted: false }.mutated());
        assert!(
            Outcome::CeilingReached {
                memory: 30720,
                cpu: 4096,
                halted: true
            }
            .mutated()
        );
    }

    #[test]
    fn ceiling_body_reports_halt_result() {
        let halted = Outcome::CeilingReached {
            memory: 30720,
            cpu: 4096,
            halted: true,
        }
        .into_result();
        assert_eq!(halted.status_code, 200);
        let ResponseBody::Notice { message } = halted.body else {
            panic!("expected notice body");
        };
        assert!(message.starts_with("Max memory reached"));
        assert!(message.contains("scaled to 0"));

        let not_halted = Outcome::CeilingReached {
            memory: 30720,
            cpu: 4096,
            halted: false,
        }
        .into_result();
        assert_eq!(not_halted.status_code, 200);
        let ResponseBody::Notice { message } = not_halted.body else {
            panic!("expected notice body");
        };
        assert!(message.contains("Failed to scale"));
    }

    #[test]
    fn text_bodies_match_contract() {
        assert_eq!(
            Outcome::NotStopped.into_result(),
            RemediationResult::text(200, "Not a STOPPED event")
        );
        assert_eq!(
            Outcome::CloneFailed { halted: true }.into_result(),
            RemediationResult::text(500, "Failed to register new task definition")
        );
    }

    #[test]
    fn custom_tiers_are_validated() {
        let mut config = ControllerConfig::new("workers");
        assert_eq!(handler_with(config.clone()).unwrap().tiers(), &TierTable::default());

        config.tiers = Some(Vec::new());
        assert_eq!(handler_with(config.clone()).err(), Some(TierTableError::Empty));

        config.tiers = Some(vec![CpuClass {
            cpu: 256,
            memory_min: 512,
            memory_max: 2048,
            step: 512,
        }]);
        let handler = handler_with(config).unwrap();
        assert_eq!(handler.tiers().classes().len(), 1);
    }
}
