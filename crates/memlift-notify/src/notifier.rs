//! Worker-update notifications to the owning platform.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{NotifyError, NotifyResult};

/// New worker sizing plus a human-readable explanation for the challenge
/// host. Sizing is omitted when it could not be read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkerUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_memory: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_cpu_cores: Option<u32>,
    pub task_def_arn: String,
    pub send_email: bool,
    pub evaluation_module_error: String,
}

impl WorkerUpdate {
    /// The worker was redeployed with more memory.
    pub fn escalated(memory_mb: u32, cpu_units: u32, task_def_arn: &str, send_email: bool) -> Self {
        Self {
            worker_memory: Some(memory_mb),
            worker_cpu_cores: Some(cpu_units),
            task_def_arn: task_def_arn.to_string(),
            send_email,
            evaluation_module_error: format!(
                "Worker ran out of memory and was restarted with more resources: \
                 memory auto-increased to {memory_mb} MB and CPU to {cpu_units} units."
            ),
        }
    }

    /// The worker was already at the largest tier and has been paused.
    pub fn ceiling_reached(memory_mb: u32, cpu_units: u32, task_def_arn: &str, send_email: bool) -> Self {
        Self {
            worker_memory: Some(memory_mb),
            worker_cpu_cores: Some(cpu_units),
            task_def_arn: task_def_arn.to_string(),
            send_email,
            evaluation_module_error: format!(
                "Worker ran out of memory at {memory_mb} MB / {cpu_units} CPU units. \
                 Maximum memory reached, so the worker service has been paused. \
                 Reduce the evaluation script's memory usage before restarting it."
            ),
        }
    }

    /// Escalation could not be completed and the worker has been paused.
    /// `sizing` is the `(memory, cpu)` the worker last ran with, if known.
    pub fn remediation_failed(
        sizing: Option<(u32, u32)>,
        task_def_arn: &str,
        reason: &str,
        send_email: bool,
    ) -> Self {
        Self {
            worker_memory: sizing.map(|(memory, _)| memory),
            worker_cpu_cores: sizing.map(|(_, cpu)| cpu),
            task_def_arn: task_def_arn.to_string(),
            send_email,
            evaluation_module_error: format!(
                "Worker ran out of memory and the automatic memory increase failed \
                 ({reason}). The worker service has been paused."
            ),
        }
    }
}

/// Callback into the platform that owns a challenge.
#[async_trait]
pub trait PlatformNotifier: Send + Sync {
    async fn notify(&self, challenge_pk: &str, update: &WorkerUpdate) -> NotifyResult<()>;
}

/// Best-effort notification: logs the outcome and reports success as a
/// bool. Never fails the caller.
pub async fn notify_evalai_api(
    notifier: &dyn PlatformNotifier,
    challenge_pk: &str,
    update: &WorkerUpdate,
) -> bool {
    match notifier.notify(challenge_pk, update).await {
        Ok(()) => {
            info!(
                %challenge_pk,
                worker_memory = ?update.worker_memory,
                worker_cpu = ?update.worker_cpu_cores,
                "platform notified"
            );
            true
        }
        Err(e) => {
            warn!(%challenge_pk, error = %e, "platform notification failed");
            false
        }
    }
}

/// Notifier that records every call, for tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, WorkerUpdate)>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent notifications fail (they are still recorded).
    pub fn fail_all(&self) {
        *self.failing.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    pub fn sent(&self) -> Vec<(String, WorkerUpdate)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PlatformNotifier for RecordingNotifier {
    async fn notify(&self, challenge_pk: &str, update: &WorkerUpdate) -> NotifyResult<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((challenge_pk.to_string(), update.clone()));
        if *self.failing.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(NotifyError::Rejected {
                status: 503,
                body: "recording notifier set to fail".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_distinguish_outcomes() {
        let up = WorkerUpdate::escalated(3072, 512, "arn:td/w:2", true);
        assert!(up.evaluation_module_error.contains("auto-increased to 3072 MB"));

        let max = WorkerUpdate::ceiling_reached(30720, 4096, "arn:td/w:9", true);
        assert!(max.evaluation_module_error.contains("Maximum memory reached"));
        assert!(max.evaluation_module_error.contains("paused"));
        assert!(!max.evaluation_module_error.contains("auto-increased"));

        let failed =
            WorkerUpdate::remediation_failed(Some((2048, 512)), "arn:td/w:1", "register rejected", false);
        assert!(failed.evaluation_module_error.contains("register rejected"));
        assert_eq!(failed.worker_memory, Some(2048));
        assert!(!failed.send_email);
    }

    #[test]
    fn unknown_sizing_is_omitted_from_payload() {
        let failed = WorkerUpdate::remediation_failed(None, "arn:td/w:1", "snapshot unreadable", true);
        let value = serde_json::to_value(&failed).unwrap();
        assert!(value.get("worker_memory").is_none());
        assert!(value.get("worker_cpu_cores").is_none());
        assert_eq!(value["task_def_arn"], "arn:td/w:1");
    }

    #[tokio::test]
    async fn recording_notifier_reports_bool() {
        let notifier = RecordingNotifier::new();
        let update = WorkerUpdate::escalated(3072, 512, "arn", true);

        assert!(notify_evalai_api(&notifier, "42", &update).await);
        notifier.fail_all();
        assert!(!notify_evalai_api(&notifier, "42", &update).await);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "42");
    }
}
