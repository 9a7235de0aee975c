//! Event ingestion API tests.
//!
//! Drives the router with an in-memory control plane, checking that the
//! HTTP status mirrors the handler's `statusCode`.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use memlift_control::InMemoryControlPlane;
use memlift_core::{ControllerConfig, ServiceDescription, Tag, TaskDefinitionSnapshot};
use memlift_notify::RecordingNotifier;
use memlift_remediate::RemediationHandler;
use memliftd::build_router;

const CLUSTER: &str = "evalai-workers";
const TASK_DEF: &str = "arn:aws:ecs:us-east-1:000000000000:task-definition/worker:1";

fn test_router(memory: &str, cpu: &str) -> (Router, Arc<InMemoryControlPlane>) {
    let control = Arc::new(InMemoryControlPlane::new());
    control.insert_task_definition(TaskDefinitionSnapshot {
        family: "worker".to_string(),
        memory: Some(memory.to_string()),
        cpu: Some(cpu.to_string()),
        task_definition_arn: TASK_DEF.to_string(),
        revision: 1,
        ..Default::default()
    });
    control.insert_service(
        CLUSTER,
        ServiceDescription {
            service_name: "challenge-9".to_string(),
            task_definition: TASK_DEF.to_string(),
            desired_count: 1,
            tags: vec![Tag::new("challenge_pk", "9")],
            ..Default::default()
        },
    );
    let handler = RemediationHandler::new(
        ControllerConfig::new(CLUSTER),
        control.clone(),
        Arc::new(RecordingNotifier::new()),
    )
    .unwrap();
    (build_router(Arc::new(handler)), control)
}

fn oom_event(group: &str) -> Value {
    json!({
        "source": "aws.ecs",
        "detail": {
            "lastStatus": "STOPPED",
            "stoppedReason": "OutOfMemoryError: Container killed due to memory usage",
            "group": group,
            "taskDefinitionArn": TASK_DEF,
            "containers": [{"name": "worker", "exitCode": 137}]
        }
    })
}

fn post_event(event: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/events")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(event).unwrap()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_reports_cluster() {
    let (router, _) = test_router("2048", "512");
    let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();

    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["cluster"], CLUSTER);
}

#[tokio::test]
async fn oom_event_is_remediated() {
    let (router, control) = test_router("2048", "512");

    let resp = router
        .oneshot(post_event(&oom_event("service:challenge-9")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["body"]["new_memory"], 3072);
    assert_eq!(body["body"]["new_cpu"], 512);
    assert_eq!(control.service_updates().len(), 1);
}

#[tokio::test]
async fn ignored_event_returns_plain_body() {
    let (router, control) = test_router("2048", "512");
    let mut event = oom_event("service:challenge-9");
    event["detail"]["lastStatus"] = json!("RUNNING");

    let resp = router.oneshot(post_event(&event)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["body"], "Not a STOPPED event");
    assert!(control.calls().is_empty());
}

#[tokio::test]
async fn status_mirrors_rejection() {
    let (router, _) = test_router("2048", "512");

    let resp = router
        .oneshot(post_event(&oom_event("family:worker")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["statusCode"], 400);
    assert_eq!(body["body"], "Could not determine service name");
}

#[tokio::test]
async fn ceiling_returns_message() {
    let (router, control) = test_router("30720", "4096");

    let resp = router
        .oneshot(post_event(&oom_event("service:challenge-9")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let message = body["body"]["message"].as_str().unwrap();
    assert!(message.starts_with("Max memory reached"));
    assert_eq!(control.service(CLUSTER, "challenge-9").unwrap().desired_count, 0);
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let (router, control) = test_router("2048", "512");
    let req = Request::builder()
        .method("POST")
        .uri("/events")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let resp = router.oneshot(req).await.unwrap();
    assert!(resp.status().is_client_error());
    assert!(control.calls().is_empty());
}
