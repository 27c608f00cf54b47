//! Secret reference validation.
//!
//! A Deployment is admitted only if every Secret mounted as a volume by its
//! pod template exists in the Deployment's namespace at admission time.
//! Lookups are never cached; a Secret deleted moments ago is caught.

use std::time::Duration;

use futures::future::join_all;
use kube::core::GroupVersionResource;
use kube::core::admission::Operation;
use tracing::debug;

use crate::error::{Error, Result};
use crate::webhooks::decoder::{
    DEPLOYMENT_GROUP, DEPLOYMENT_VERSION, DecodeError, VolumeReference, Workload,
    WorkloadDecoder,
};
use crate::webhooks::envelope::ReviewRequest;
use crate::webhooks::secrets::SecretLookup;

/// Plural resource name of the supported workload
pub const DEPLOYMENT_RESOURCE: &str = "deployments";

/// Denial reason: referenced Secrets do not exist
pub const REASON_SECRETS_UNAVAILABLE: &str = "SecretsUnavailable";
/// Denial reason: the candidate object could not be decoded
pub const REASON_DECODE_FAILED: &str = "DecodeFailed";
/// Denial reason: Secret existence could not be determined
pub const REASON_LOOKUP_FAILED: &str = "SecretLookupFailed";

/// Outcome of validating one admission request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    /// Secret names that do not exist, in declaration order
    pub missing_references: Vec<String>,
    /// Machine-readable denial reason
    pub reason: Option<&'static str>,
    /// Human-readable explanation, set whenever `allowed` is false
    pub message: Option<String>,
    /// Warning returned to the client alongside an admitted request
    pub warning: Option<String>,
}

impl Decision {
    /// Admit the request
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            missing_references: Vec::new(),
            reason: None,
            message: None,
            warning: None,
        }
    }

    /// Admit a request this webhook has no rule for
    pub fn not_applicable(warning: impl Into<String>) -> Self {
        Self {
            warning: Some(warning.into()),
            ..Self::allowed()
        }
    }

    /// Deny the request
    pub fn denied(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            missing_references: Vec::new(),
            reason: Some(reason),
            message: Some(message.into()),
            warning: None,
        }
    }

    /// Deny the request because the given Secrets do not exist
    pub fn missing(missing_references: Vec<String>) -> Self {
        let message = format!("secrets unavailable: {}", missing_references.join(", "));
        Self {
            missing_references,
            ..Self::denied(REASON_SECRETS_UNAVAILABLE, message)
        }
    }

    /// Short label used for metrics
    pub fn outcome(&self) -> &'static str {
        match (self.allowed, &self.warning) {
            (false, _) => "denied",
            (true, Some(_)) => "unsupported",
            (true, None) => "allowed",
        }
    }
}

/// Check if the request targets `apps/v1` deployments
pub fn is_supported_resource(resource: &GroupVersionResource) -> bool {
    resource.group == DEPLOYMENT_GROUP
        && resource.version == DEPLOYMENT_VERSION
        && resource.resource == DEPLOYMENT_RESOURCE
}

/// The secret reference rule.
///
/// Built once at startup around a decoder and a lookup capability, then
/// shared read-only by every request.
pub struct ValidationEngine<L> {
    decoder: WorkloadDecoder,
    secrets: L,
    lookup_timeout: Duration,
}

impl<L: SecretLookup> ValidationEngine<L> {
    pub fn new(decoder: WorkloadDecoder, secrets: L, lookup_timeout: Duration) -> Self {
        Self {
            decoder,
            secrets,
            lookup_timeout,
        }
    }

    /// Decide whether to admit a review request.
    ///
    /// Always returns a decision; faults deny the request.
    pub async fn validate(&self, review: &ReviewRequest) -> Decision {
        let request = &review.request;

        // Unrecognized resources are admitted; the webhook configuration is
        // expected to route only deployments here.
        if !is_supported_resource(&request.resource) {
            return Decision::not_applicable(format!(
                "{}/{} {} is not validated by the secret admission webhook",
                request.resource.group, request.resource.version, request.resource.resource
            ));
        }

        // Subresources (scale, status) carry a different kind than the workload
        if let Some(sub_resource) = request.sub_resource.as_deref().filter(|s| !s.is_empty()) {
            return Decision::not_applicable(format!(
                "{}/{} {}/{} is not validated by the secret admission webhook",
                request.resource.group,
                request.resource.version,
                request.resource.resource,
                sub_resource
            ));
        }

        if matches!(request.operation, Operation::Delete | Operation::Connect) {
            return Decision::allowed();
        }

        let workload = match review.object.as_deref() {
            Some(raw) => self.decoder.decode(raw, &request.kind),
            None => Err(DecodeError::MissingObject),
        };
        let workload = match workload {
            Ok(workload) => workload,
            Err(e) => return Decision::denied(REASON_DECODE_FAILED, e.to_string()),
        };

        // The object omits its namespace on CREATE; the request always has it
        let namespace = if workload.namespace.is_empty() {
            request.namespace.as_deref().unwrap_or_default()
        } else {
            workload.namespace.as_str()
        };

        self.check_references(namespace, &workload).await
    }

    /// Decide based on the Secrets referenced by `workload` in `namespace`.
    pub async fn check_references(&self, namespace: &str, workload: &Workload) -> Decision {
        if workload.secret_references().next().is_none() {
            return Decision::allowed();
        }

        match self.find_missing(namespace, workload).await {
            Ok(missing) if missing.is_empty() => Decision::allowed(),
            Ok(missing) => Decision::missing(missing),
            Err(e) => Decision::denied(
                REASON_LOOKUP_FAILED,
                format!("unable to verify secrets in namespace {}: {}", namespace, e),
            ),
        }
    }

    /// Secret names referenced by `workload` that do not exist, keeping
    /// order and repeats.
    async fn find_missing(&self, namespace: &str, workload: &Workload) -> Result<Vec<String>> {
        let references: Vec<(&str, &str)> = workload
            .volumes
            .iter()
            .filter_map(|volume| match volume {
                VolumeReference::Secret { volume, name } => Some((volume.as_str(), name.as_str())),
                VolumeReference::Opaque { .. } => None,
            })
            .collect();

        let secrets = &self.secrets;
        let lookups = references.iter().map(|&(_, name)| async move {
            if name.is_empty() {
                return Ok(false);
            }
            secrets.exists(namespace, name).await
        });

        let results = tokio::time::timeout(self.lookup_timeout, join_all(lookups))
            .await
            .map_err(|_| Error::LookupTimeout {
                namespace: namespace.to_string(),
                timeout: self.lookup_timeout,
            })?;

        let mut missing = Vec::new();
        for ((volume, name), exists) in references.into_iter().zip(results) {
            if !exists? {
                debug!(
                    namespace = %namespace,
                    workload = %workload.name,
                    volume = %volume,
                    secret = %name,
                    "Volume references a missing secret"
                );
                missing.push(name.to_string());
            }
        }
        Ok(missing)
    }
}
