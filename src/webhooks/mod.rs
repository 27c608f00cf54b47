//! Validating admission webhook for Deployments.
//!
//! A review flows through four parts:
//! - `envelope`: decodes the AdmissionReview body (transport faults end here)
//! - `decoder`: turns the candidate object into a [`Workload`]
//! - `validation`: checks every referenced Secret and produces a [`Decision`]
//! - `server`: HTTP/TLS handling and the correlated response envelope

pub mod decoder;
pub mod envelope;
pub mod secrets;
mod server;
pub mod validation;

pub use decoder::{DecodeError, VolumeReference, Workload, WorkloadDecoder};
pub use envelope::{EnvelopeError, ReviewDecoder, ReviewRequest};
pub use secrets::{ClusterSecretLookup, SecretLookup};
pub use server::{
    MAX_REVIEW_BODY_BYTES, VALIDATE_PATH, WebhookError, WebhookState, build_response,
    create_webhook_router, run_webhook_server,
};
pub use validation::{Decision, ValidationEngine};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
