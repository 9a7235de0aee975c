//! Service resolution and the staleness guard.

use tracing::{debug, warn};

use memlift_control::ControlPlane;
use memlift_core::{CHALLENGE_PK_TAG, ServiceDescription, StaleLookupPolicy, TaskStateChange};

const SERVICE_GROUP_PREFIX: &str = "service:";

/// Service name from a task's `group`, which is `service:<name>` for
/// tasks launched by a service.
pub fn get_service_name_from_task(detail: &TaskStateChange) -> Option<String> {
    detail
        .group
        .strip_prefix(SERVICE_GROUP_PREFIX)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Describe a service, logging and swallowing lookup errors.
async fn lookup_service(
    client: &dyn ControlPlane,
    cluster: &str,
    service: &str,
) -> Option<ServiceDescription> {
    match client.describe_service(cluster, service).await {
        Ok(found) => {
            if found.is_none() {
                debug!(%cluster, %service, "service not found");
            }
            found
        }
        Err(e) => {
            warn!(%cluster, %service, error = %e, "describe service failed");
            None
        }
    }
}

/// The `challenge_pk` tag of a service. `None` when the tag is absent,
/// the service does not exist, or the lookup fails.
pub async fn get_challenge_pk_from_service(
    client: &dyn ControlPlane,
    cluster: &str,
    service: &str,
) -> Option<String> {
    let description = lookup_service(client, cluster, service).await?;
    let pk = description.tag(CHALLENGE_PK_TAG).map(str::to_string);
    if pk.is_none() {
        debug!(%cluster, %service, "service has no challenge_pk tag");
    }
    pk
}

/// Whether an event's task definition is still the one its service runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The service runs the event's task definition.
    Current,
    /// The service has moved on to another task definition.
    Stale,
    /// The service could not be described.
    Unknown,
}

impl Freshness {
    /// Whether the event should be ignored under `policy`.
    pub fn is_stale(self, policy: StaleLookupPolicy) -> bool {
        match self {
            Self::Current => false,
            Self::Stale => true,
            Self::Unknown => policy == StaleLookupPolicy::FailClosed,
        }
    }
}

/// Compare the service's current task definition with the event's.
pub async fn check_freshness(
    client: &dyn ControlPlane,
    cluster: &str,
    service: &str,
    event_task_def_arn: &str,
) -> Freshness {
    let Some(description) = lookup_service(client, cluster, service).await else {
        return Freshness::Unknown;
    };
    if description.task_definition == event_task_def_arn {
        Freshness::Current
    } else {
        debug!(
            %service,
            current = %description.task_definition,
            event = %event_task_def_arn,
            "service has moved to a newer task definition"
        );
        Freshness::Stale
    }
}

/// True when the service's current task definition differs from the
/// event's. A failed or empty lookup counts as fresh.
pub async fn is_stale_event(
    client: &dyn ControlPlane,
    cluster: &str,
    service: &str,
    event_task_def_arn: &str,
) -> bool {
    check_freshness(client, cluster, service, event_task_def_arn)
        .await
        .is_stale(StaleLookupPolicy::FailOpen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memlift_control::{InMemoryControlPlane, Operation};
    use memlift_core::Tag;

    const CLUSTER: &str = "workers";

    fn detail(group: &str) -> TaskStateChange {
        TaskStateChange {
            group: group.to_string(),
            ..Default::default()
        }
    }

    fn fake_with(tags: Vec<Tag>) -> InMemoryControlPlane {
        let fake = InMemoryControlPlane::new();
        fake.insert_service(
            CLUSTER,
            ServiceDescription {
                service_name: "challenge-7".to_string(),
                task_definition: "arn:td/worker:3".to_string(),
                desired_count: 1,
                tags,
                ..Default::default()
            },
        );
        fake
    }

    #[test]
    fn service_group_yields_name() {
        assert_eq!(
            get_service_name_from_task(&detail("service:challenge-7")),
            Some("challenge-7".to_string())
        );
    }

    #[test]
    fn other_groups_yield_nothing() {
        for group in ["", "service:", "family:worker", "challenge-7", "SERVICE:x"] {
            assert_eq!(get_service_name_from_task(&detail(group)), None, "{group}");
        }
    }

    #[tokio::test]
    async fn challenge_pk_comes_from_tag() {
        let fake = fake_with(vec![Tag::new("team", "a"), Tag::new("challenge_pk", "7")]);
        assert_eq!(
            get_challenge_pk_from_service(&fake, CLUSTER, "challenge-7").await,
            Some("7".to_string())
        );
    }

    #[tokio::test]
    async fn challenge_pk_missing_cases() {
        let untagged = fake_with(Vec::new());
        assert_eq!(get_challenge_pk_from_service(&untagged, CLUSTER, "challenge-7").await, None);
        assert_eq!(get_challenge_pk_from_service(&untagged, CLUSTER, "other").await, None);

        let broken = fake_with(vec![Tag::new("challenge_pk", "7")]);
        broken.fail(Operation::DescribeService);
        assert_eq!(get_challenge_pk_from_service(&broken, CLUSTER, "challenge-7").await, None);
    }

    #[tokio::test]
    async fn freshness_compares_task_definitions() {
        let fake = fake_with(Vec::new());
        assert_eq!(
            check_freshness(&fake, CLUSTER, "challenge-7", "arn:td/worker:3").await,
            Freshness::Current
        );
        assert_eq!(
            check_freshness(&fake, CLUSTER, "challenge-7", "arn:td/worker:2").await,
            Freshness::Stale
        );
        assert_eq!(
            check_freshness(&fake, CLUSTER, "missing", "arn:td/worker:3").await,
            Freshness::Unknown
        );
    }

    #[tokio::test]
    async fn stale_check_fails_open() {
        let fake = fake_with(Vec::new());
        assert!(is_stale_event(&fake, CLUSTER, "challenge-7", "arn:td/worker:2").await);
        assert!(!is_stale_event(&fake, CLUSTER, "challenge-7", "arn:td/worker:3").await);
        assert!(!is_stale_event(&fake, CLUSTER, "missing", "arn:td/worker:2").await);

        fake.fail(Operation::DescribeService);
        assert!(!is_stale_event(&fake, CLUSTER, "challenge-7", "arn:td/worker:2").await);
    }

    #[test]
    fn unknown_freshness_follows_policy() {
        assert!(!Freshness::Unknown.is_stale(StaleLookupPolicy::FailOpen));
        assert!(Freshness::Unknown.is_stale(StaleLookupPolicy::FailClosed));
        assert!(Freshness::Stale.is_stale(StaleLookupPolicy::FailOpen));
        assert!(!Freshness::Current.is_stale(StaleLookupPolicy::FailClosed));
    }
}
