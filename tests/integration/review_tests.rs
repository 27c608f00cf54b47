//! Complete reviews answered from a live API server.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use secret_admission_webhook::{
    ClusterSecretLookup, HealthState, ReviewDecoder, ValidationEngine, WebhookState,
    WorkloadDecoder,
};
use serde_json::Value;

use crate::TestNamespace;
use crate::common::fixtures::{DeploymentBuilder, ReviewBuilder};
use crate::test_client;

async fn review(ns: &TestNamespace, body: &[u8]) -> Value {
    let engine = ValidationEngine::new(
        WorkloadDecoder::new(),
        ClusterSecretLookup::new(ns.client()),
        Duration::from_secs(5),
    );
    let state = WebhookState::new(
        ReviewDecoder::new(),
        engine,
        Some(Arc::new(HealthState::new())),
    );

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let response = state.handle(&headers, body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster"]
async fn test_deployment_with_missing_secret_is_denied() {
    let ns = TestNamespace::create(test_client().await, "review-deny").await;
    ns.create_secret("a").await;

    let object = DeploymentBuilder::new("web")
        .namespace(ns.name())
        .secret_volume("a")
        .config_map_volume("settings")
        .secret_volume("b")
        .build();
    let body = ReviewBuilder::new("uid-live-deny")
        .namespace(ns.name())
        .object(object)
        .build();

    let review = review(&ns, &body).await;
    assert_eq!(review["response"]["uid"], "uid-live-deny");
    assert_eq!(review["response"]["allowed"], false);
    assert_eq!(review["response"]["status"]["message"], "secrets unavailable: b");
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster"]
async fn test_deployment_with_present_secrets_is_allowed() {
    let ns = TestNamespace::create(test_client().await, "review-allow").await;
    ns.create_secret("a").await;
    ns.create_secret("b").await;

    let object = DeploymentBuilder::new("web")
        .secret_volume("a")
        .secret_volume("b")
        .build();
    let body = ReviewBuilder::new("uid-live-allow")
        .namespace(ns.name())
        .object(object)
        .build();

    let review = review(&ns, &body).await;
    assert_eq!(review["response"]["uid"], "uid-live-allow");
    assert_eq!(review["response"]["allowed"], true);
}
