//! Workload decoding.
//!
//! Turns the raw candidate object of an admission request into a
//! [`Workload`]: the namespace and volume list, which is all the secret
//! reference check needs. Decoding is a pure function of its input.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Volume;
use kube::core::GroupVersionKind;
use serde::Deserialize;
use thiserror::Error;

/// API group of the supported workload
pub const DEPLOYMENT_GROUP: &str = "apps";
/// API version of the supported workload
pub const DEPLOYMENT_VERSION: &str = "v1";
/// Kind of the supported workload
pub const DEPLOYMENT_KIND: &str = "Deployment";

/// Decode faults: the payload does not match its declared kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("request carries no object")]
    MissingObject,

    #[error("failed to decode {kind}: {message}")]
    Malformed { kind: String, message: String },

    #[error("object declares {embedded} but request declares {declared}")]
    KindMismatch { declared: String, embedded: String },

    #[error("unsupported kind {0}")]
    UnsupportedKind(String),
}

/// A volume entry of a workload's pod template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeReference {
    /// Volume backed by a Secret
    Secret { volume: String, name: String },
    /// Any other volume source
    Opaque { volume: String },
}

impl VolumeReference {
    fn from_volume(volume: &Volume) -> Self {
        match &volume.secret {
            Some(source) => VolumeReference::Secret {
                volume: volume.name.clone(),
                name: source.secret_name.clone().unwrap_or_default(),
            },
            None => VolumeReference::Opaque {
                volume: volume.name.clone(),
            },
        }
    }

    /// Name of the referenced Secret, if this is a secret volume
    pub fn secret_name(&self) -> Option<&str> {
        match self {
            VolumeReference::Secret { name, .. } => Some(name),
            VolumeReference::Opaque { .. } => None,
        }
    }
}

/// The decoded candidate workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub name: String,
    /// Namespace from the object's metadata; empty if the object omits it
    pub namespace: String,
    /// Pod template volumes in declaration order
    pub volumes: Vec<VolumeReference>,
}

impl Workload {
    /// Secret names referenced by the volume list, in declaration order.
    ///
    /// Repeated references are yielded once per volume.
    pub fn secret_references(&self) -> impl Iterator<Item = &str> {
        self.volumes.iter().filter_map(VolumeReference::secret_name)
    }
}

impl From<Deployment> for Workload {
    fn from(deployment: Deployment) -> Self {
        let metadata = deployment.metadata;
        let volumes = deployment
            .spec
            .and_then(|spec| spec.template.spec)
            .and_then(|pod| pod.volumes)
            .unwrap_or_default();

        Self {
            name: metadata
                .name
                .or(metadata.generate_name)
                .unwrap_or_default(),
            namespace: metadata.namespace.unwrap_or_default(),
            volumes: volumes.iter().map(VolumeReference::from_volume).collect(),
        }
    }
}

/// Type information embedded in a serialized object
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct EmbeddedType {
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    kind: Option<String>,
}

fn gvk_api_version(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        gvk.version.clone()
    } else {
        format!("{}/{}", gvk.group, gvk.version)
    }
}

fn describe(api_version: &str, kind: &str) -> String {
    format!("{}, Kind={}", api_version, kind)
}

/// Decoder for candidate workloads.
///
/// Holds no state; constructed once at startup and shared.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkloadDecoder;

impl WorkloadDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode `raw` as the workload kind declared by the request.
    ///
    /// If the object carries its own `apiVersion`/`kind` they must agree
    /// with `declared`.
    pub fn decode(&self, raw: &[u8], declared: &GroupVersionKind) -> Result<Workload, DecodeError> {
        let declared_version = gvk_api_version(declared);
        let malformed = |e: serde_json::Error| DecodeError::Malformed {
            kind: declared.kind.clone(),
            message: e.to_string(),
        };

        let embedded: EmbeddedType = serde_json::from_slice(raw).map_err(malformed)?;
        let api_version = embedded.api_version.unwrap_or_else(|| declared_version.clone());
        let kind = embedded.kind.unwrap_or_else(|| declared.kind.clone());

        if api_version != declared_version || kind != declared.kind {
            return Err(DecodeError::KindMismatch {
                declared: describe(&declared_version, &declared.kind),
                embedded: describe(&api_version, &kind),
            });
        }

        if declared.group != DEPLOYMENT_GROUP
            || declared.version != DEPLOYMENT_VERSION
            || declared.kind != DEPLOYMENT_KIND
        {
            return Err(DecodeError::UnsupportedKind(describe(&api_version, &kind)));
        }

        let deployment: Deployment = serde_json::from_slice(raw).map_err(malformed)?;
        Ok(Workload::from(deployment))
    }
}
