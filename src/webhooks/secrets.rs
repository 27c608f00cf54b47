//! Secret existence checks.
//!
//! The validation engine only needs to know whether a named Secret exists in
//! a namespace. [`SecretLookup`] is that capability; [`ClusterSecretLookup`]
//! answers it from the API server.

use std::future::Future;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use tracing::{debug, instrument};

use crate::error::{Error, Result};

/// Point lookup of Secrets by namespace and name.
///
/// `Ok(false)` means the Secret does not exist. Any other failure to
/// answer is an `Err`, kept distinct from not-found.
pub trait SecretLookup: Send + Sync {
    fn exists(&self, namespace: &str, name: &str) -> impl Future<Output = Result<bool>> + Send;
}

impl<T: SecretLookup + ?Sized> SecretLookup for Arc<T> {
    async fn exists(&self, namespace: &str, name: &str) -> Result<bool> {
        (**self).exists(namespace, name).await
    }
}

/// Secret lookups against the cluster the webhook runs in.
///
/// Wraps a single shared [`Client`]; clones share its connection pool.
#[derive(Clone)]
pub struct ClusterSecretLookup {
    client: Client,
}

impl ClusterSecretLookup {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl SecretLookup for ClusterSecretLookup {
    #[instrument(skip(self))]
    async fn exists(&self, namespace: &str, name: &str) -> Result<bool> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);

        // Metadata is enough to prove existence and keeps secret data out of memory
        match api.get_metadata(name).await.map_err(Error::from) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => {
                debug!(namespace = %namespace, name = %name, "Secret not found");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
