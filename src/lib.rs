//! secret-admission-webhook library crate
//!
//! Validating admission webhook that rejects Deployments whose pod template
//! mounts Secrets that do not exist in the Deployment's namespace.

pub mod config;
pub mod error;
pub mod health;
pub mod webhooks;

pub use config::Config;
pub use error::Error;
pub use health::HealthState;
pub use webhooks::{
    ClusterSecretLookup, Decision, ReviewDecoder, SecretLookup, ValidationEngine, WebhookError,
    WebhookState, WorkloadDecoder, run_webhook_server,
};
