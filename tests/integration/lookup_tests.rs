//! Secret lookups against a live API server.

use std::time::Duration;

use secret_admission_webhook::webhooks::{VolumeReference, Workload};
use secret_admission_webhook::{ClusterSecretLookup, SecretLookup, ValidationEngine, WorkloadDecoder};

use crate::{TestNamespace, test_client};

fn workload(namespace: &str, secrets: &[&str]) -> Workload {
    Workload {
        name: "web".to_string(),
        namespace: namespace.to_string(),
        volumes: secrets
            .iter()
            .enumerate()
            .map(|(i, name)| VolumeReference::Secret {
                volume: format!("vol-{}", i),
                name: name.to_string(),
            })
            .collect(),
    }
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster"]
async fn test_existing_secret_is_found() {
    let ns = TestNamespace::create(test_client().await, "lookup-exists").await;
    ns.create_secret("db-credentials").await;

    let lookup = ClusterSecretLookup::new(ns.client());
    assert!(lookup.exists(ns.name(), "db-credentials").await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster"]
async fn test_absent_secret_is_not_found() {
    let ns = TestNamespace::create(test_client().await, "lookup-absent").await;

    let lookup = ClusterSecretLookup::new(ns.client());
    assert!(!lookup.exists(ns.name(), "never-created").await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster"]
async fn test_secret_in_other_namespace_is_not_found() {
    let client = test_client().await;
    let ns = TestNamespace::create(client.clone(), "lookup-home").await;
    let other = TestNamespace::create(client, "lookup-other").await;
    other.create_secret("shared").await;

    let lookup = ClusterSecretLookup::new(ns.client());
    assert!(!lookup.exists(ns.name(), "shared").await.unwrap());
    assert!(lookup.exists(other.name(), "shared").await.unwrap());
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires Kubernetes cluster"]
async fn test_engine_reports_missing_secrets() {
    let ns = TestNamespace::create(test_client().await, "lookup-engine").await;
    ns.create_secret("a").await;

    let engine = ValidationEngine::new(
        WorkloadDecoder::new(),
        ClusterSecretLookup::new(ns.client()),
        Duration::from_secs(5),
    );
    let decision = engine
        .check_references(ns.name(), &workload(ns.name(), &["a", "b", "c"]))
        .await;

    assert!(!decision.allowed);
    assert_eq!(decision.missing_references, vec!["b", "c"]);
    assert_eq!(decision.message.as_deref(), Some("secrets unavailable: b, c"));
}
