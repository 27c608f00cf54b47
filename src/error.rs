//! Error types for the webhook.
//!
//! Faults that occur while talking to the cluster, as opposed to faults in
//! the admission payload itself (see `webhooks::envelope` and
//! `webhooks::decoder`).

use std::time::Duration;
use thiserror::Error;

/// Error type for cluster-facing operations
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Secret lookups did not finish before the per-request deadline
    #[error("secret lookups in namespace {namespace} timed out after {}s", timeout.as_secs())]
    LookupTimeout {
        namespace: String,
        timeout: Duration,
    },
}

impl Error {
    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 404)
    }
}

/// Result type alias for cluster-facing operations
pub type Result<T> = std::result::Result<T, Error>;
