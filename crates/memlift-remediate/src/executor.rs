//! Service mutations: redeploy on a new revision, or halt.

use tracing::{info, warn};

use memlift_control::ControlPlane;
use memlift_core::ServiceUpdate;

async fn apply(client: &dyn ControlPlane, update: &ServiceUpdate, action: &'static str) -> bool {
    match client.update_service(update).await {
        Ok(()) => {
            info!(
                cluster = %update.cluster,
                service = %update.service,
                task_def = ?update.task_definition,
                desired_count = ?update.desired_count,
                "{action}"
            );
            true
        }
        Err(e) => {
            warn!(
                cluster = %update.cluster,
                service = %update.service,
                code = e.code(),
                error = %e,
                "{action} failed"
            );
            false
        }
    }
}

/// Pin the service to `new_arn` and force a new deployment.
pub async fn update_service_with_new_task_def(
    client: &dyn ControlPlane,
    cluster: &str,
    service: &str,
    new_arn: &str,
) -> bool {
    let update = ServiceUpdate::redeploy(cluster, service, new_arn);
    apply(client, &update, "redeployed service").await
}

/// Set the service's desired count to zero.
pub async fn scale_service_to_zero(client: &dyn ControlPlane, cluster: &str, service: &str) -> bool {
    let update = ServiceUpdate::halt(cluster, service);
    apply(client, &update, "scaled service to zero").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use memlift_control::{InMemoryControlPlane, Operation};
    use memlift_core::ServiceDescription;

    fn seeded() -> InMemoryControlPlane {
        let fake = InMemoryControlPlane::new();
        fake.insert_service(
            "workers",
            ServiceDescription {
                service_name: "challenge-3".to_string(),
                task_definition: "arn:td/worker:1".to_string(),
                desired_count: 2,
                ..Default::default()
            },
        );
        fake
    }

    #[tokio::test]
    async fn redeploy_pins_and_forces() {
        let fake = seeded();
        assert!(update_service_with_new_task_def(&fake, "workers", "challenge-3", "arn:td/worker:2").await);

        let updates = fake.service_updates();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].force_new_deployment);
        assert!(!updates[0].is_halt());
        assert_eq!(
            fake.service("workers", "challenge-3").unwrap().task_definition,
            "arn:td/worker:2"
        );
    }

    #[tokio::test]
    async fn halt_sets_zero_desired_count() {
        let fake = seeded();
        assert!(scale_service_to_zero(&fake, "workers", "challenge-3").await);
        let service = fake.service("workers", "challenge-3").unwrap();
        assert_eq!(service.desired_count, 0);
        assert_eq!(service.task_definition, "arn:td/worker:1");
    }

    #[tokio::test]
    async fn failures_report_false() {
        let fake = seeded();
        assert!(!scale_service_to_zero(&fake, "workers", "missing").await);

        fake.fail(Operation::UpdateService);
        assert!(!update_service_with_new_task_def(&fake, "workers", "challenge-3", "arn:td/worker:2").await);
        assert!(!scale_service_to_zero(&fake, "workers", "challenge-3").await);
        assert_eq!(fake.service("workers", "challenge-3").unwrap().desired_count, 2);
    }
}
