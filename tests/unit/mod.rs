// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for secret-admission-webhook.
//!
//! These tests run without a Kubernetes cluster and exercise the public API
//! of each component in isolation.

#[path = "../common/mod.rs"]
mod common;

mod decoder_tests {
    use crate::common::fixtures::DeploymentBuilder;
    use kube::core::GroupVersionKind;
    use secret_admission_webhook::webhooks::{DecodeError, VolumeReference, WorkloadDecoder};

    fn deployment_gvk() -> GroupVersionKind {
        GroupVersionKind::gvk("apps", "v1", "Deployment")
    }

    #[test]
    fn test_decode_fixture_deployment() {
        let object = DeploymentBuilder::new("web")
            .namespace("ns1")
            .secret_volume("a")
            .config_map_volume("settings")
            .empty_dir_volume()
            .secret_volume("b")
            .build();
        let raw = serde_json::to_vec(&object).unwrap();

        let workload = WorkloadDecoder::new().decode(&raw, &deployment_gvk()).unwrap();
        assert_eq!(workload.namespace, "ns1");
        assert_eq!(workload.volumes.len(), 4);
        assert!(matches!(workload.volumes[1], VolumeReference::Opaque { .. }));
        assert_eq!(workload.secret_references().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_statefulset_is_unsupported() {
        let raw = serde_json::to_vec(&serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "StatefulSet"
        }))
        .unwrap();
        let err = WorkloadDecoder::new()
            .decode(&raw, &GroupVersionKind::gvk("apps", "v1", "StatefulSet"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedKind(_)));
    }
}

mod decision_tests {
    use secret_admission_webhook::Decision;
    use secret_admission_webhook::webhooks::validation::{
        REASON_DECODE_FAILED, REASON_SECRETS_UNAVAILABLE,
    };

    #[test]
    fn test_missing_decision_message() {
        let decision = Decision::missing(vec!["a".to_string(), "b".to_string()]);
        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(REASON_SECRETS_UNAVAILABLE));
        assert_eq!(decision.message.as_deref(), Some("secrets unavailable: a, b"));
    }

    #[test]
    fn test_denied_decision_has_no_missing_references() {
        let decision = Decision::denied(REASON_DECODE_FAILED, "bad payload");
        assert!(decision.missing_references.is_empty());
        assert_eq!(decision.outcome(), "denied");
    }

    #[test]
    fn test_allowed_decision_has_no_message() {
        let decision = Decision::allowed();
        assert!(decision.allowed);
        assert!(decision.message.is_none());
        assert!(decision.reason.is_none());
    }
}

mod response_tests {
    use crate::common::fixtures::{DeploymentBuilder, ReviewBuilder};
    use secret_admission_webhook::webhooks::{Decision, ReviewDecoder, build_response};

    #[test]
    fn test_denied_response_carries_reason_and_uid() {
        let body = ReviewBuilder::new("abc-123")
            .object(DeploymentBuilder::new("web").build())
            .build();
        let review = ReviewDecoder::new().decode(&body).unwrap();

        let response = build_response(&review.request, &Decision::missing(vec!["x".to_string()]));
        assert_eq!(response.uid, "abc-123");
        assert!(!response.allowed);
        assert_eq!(response.result.message, "secrets unavailable: x");
        assert_eq!(response.result.reason, "SecretsUnavailable");
    }

    #[test]
    fn test_review_envelope_type_is_echoed() {
        let body = ReviewBuilder::new("abc-123")
            .api_version("admission.k8s.io/v1beta1")
            .object(DeploymentBuilder::new("web").build())
            .build();
        let review = ReviewDecoder::new().decode(&body).unwrap();

        let envelope = build_response(&review.request, &Decision::allowed()).into_review();
        assert_eq!(envelope.types.api_version, "admission.k8s.io/v1beta1");
        assert_eq!(envelope.types.kind, "AdmissionReview");
        assert_eq!(envelope.response.unwrap().uid, "abc-123");
    }
}

mod config_tests {
    use clap::Parser;
    use secret_admission_webhook::Config;
    use secret_admission_webhook::config::DEFAULT_WEBHOOK_PORT;

    #[test]
    fn test_all_flags() {
        let config = Config::try_parse_from([
            "secret-admission-webhook",
            "--port",
            "10443",
            "--tls-cert-path",
            "/certs/tls.crt",
            "--tls-key-path",
            "/certs/tls.key",
            "--health-port",
            "9090",
            "--lookup-timeout-secs",
            "2",
        ])
        .unwrap();

        assert_ne!(config.port, DEFAULT_WEBHOOK_PORT);
        assert_eq!(config.webhook_addr().port(), 10443);
        assert_eq!(config.health_addr().port(), 9090);
        assert_eq!(config.lookup_timeout().as_secs(), 2);
        assert_eq!(config.tls_cert_path.to_str(), Some("/certs/tls.crt"));
    }
}
