//! Admission webhook server.
//!
//! Serves `POST /validate` over TLS. Every request ends in exactly one of:
//! - 200 with an AdmissionReview whose response carries the request's UID
//! - 400 with a plain-text explanation when the body is not a usable review
//! - 500 when the response envelope cannot be serialized
//!
//! To enable the webhook:
//! 1. Mount a TLS certificate and key at the configured paths
//! 2. Create a ValidatingWebhookConfiguration for `apps/v1` deployments
//!    pointing at `/validate`

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::rejection::BytesRejection;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Router, extract::State, routing::post};
use axum_server::Handle;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::health::HealthState;
use crate::webhooks::envelope::{EnvelopeError, JSON_MEDIA_TYPE, ReviewDecoder, check_content_type};
use crate::webhooks::secrets::SecretLookup;
use crate::webhooks::validation::{Decision, ValidationEngine};

/// Path the review endpoint is served on
pub const VALIDATE_PATH: &str = "/validate";

/// Largest review body accepted.
///
/// An UPDATE review carries both the new and the old object, each of which
/// can approach the API server's 3 MiB request limit.
pub const MAX_REVIEW_BODY_BYTES: usize = 6 * 1024 * 1024;

/// Shared state for webhook handlers
pub struct WebhookState<L> {
    reviews: ReviewDecoder,
    engine: ValidationEngine<L>,
    health: Option<Arc<HealthState>>,
}

impl<L: SecretLookup> WebhookState<L> {
    pub fn new(
        reviews: ReviewDecoder,
        engine: ValidationEngine<L>,
        health: Option<Arc<HealthState>>,
    ) -> Self {
        Self {
            reviews,
            engine,
            health,
        }
    }

    /// Answer one review request.
    pub async fn handle(&self, headers: &HeaderMap, body: &[u8]) -> Response {
        let started = Instant::now();
        let response = self.review(headers, body).await;
        if let Some(health) = &self.health {
            health
                .metrics
                .observe_duration(started.elapsed().as_secs_f64());
        }
        response
    }

    async fn review(&self, headers: &HeaderMap, body: &[u8]) -> Response {
        if let Err(e) = check_content_type(headers) {
            return self.reject(e);
        }

        let review = match self.reviews.decode(body) {
            Ok(review) => review,
            Err(e) => return self.reject(e),
        };

        let request = &review.request;
        debug!(
            uid = %request.uid,
            operation = ?request.operation,
            namespace = ?request.namespace,
            name = %request.name,
            "Processing admission request"
        );

        let decision = self.engine.validate(&review).await;
        if let Some(health) = &self.health {
            health
                .metrics
                .record_review(decision.outcome(), decision.missing_references.len());
        }

        match (decision.allowed, &decision.warning) {
            (true, None) => info!(uid = %request.uid, "Admission request allowed"),
            (true, Some(warning)) => warn!(
                uid = %request.uid,
                warning = %warning,
                "Admission request not applicable, allowed"
            ),
            (false, _) => warn!(
                uid = %request.uid,
                reason = ?decision.reason,
                message = ?decision.message,
                "Admission request denied"
            ),
        }

        let response = build_response(request, &decision);
        match serde_json::to_vec(&response.into_review()) {
            Ok(bytes) => {
                (StatusCode::OK, [(CONTENT_TYPE, JSON_MEDIA_TYPE)], bytes).into_response()
            }
            Err(e) => {
                error!(uid = %request.uid, error = %e, "Response marshal failed");
                if let Some(health) = &self.health {
                    health.metrics.record_fault("serialization");
                }
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        }
    }

    fn reject(&self, fault: EnvelopeError) -> Response {
        warn!(error = %fault, "Rejecting admission request");
        if let Some(health) = &self.health {
            health.metrics.record_fault(fault.fault());
        }
        (StatusCode::BAD_REQUEST, fault.to_string()).into_response()
    }
}

/// Build the response for `request` from a decision.
///
/// The response always carries the request's UID and envelope type.
pub fn build_response(
    request: &AdmissionRequest<DynamicObject>,
    decision: &Decision,
) -> AdmissionResponse {
    let mut response = AdmissionResponse::from(request);

    if !decision.allowed {
        response = response.deny(decision.message.clone().unwrap_or_default());
        response.result.reason = decision.reason.unwrap_or_default().to_string();
    }
    if let Some(warning) = &decision.warning {
        response.warnings = Some(vec![warning.clone()]);
    }

    response.uid = request.uid.clone();
    response
}

async fn validate<L: SecretLookup>(
    State(state): State<Arc<WebhookState<L>>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    match body {
        Ok(body) => state.handle(&headers, &body).await,
        Err(e) => state.reject(EnvelopeError::UnreadableBody(e.body_text())),
    }
}

/// Create the webhook router
pub fn create_webhook_router<L: SecretLookup + 'static>(state: Arc<WebhookState<L>>) -> Router {
    Router::new()
        .route(VALIDATE_PATH, post(validate::<L>))
        .layer(DefaultBodyLimit::max(MAX_REVIEW_BODY_BYTES))
        .with_state(state)
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Run the webhook server with TLS.
///
/// Certificates are read once at startup. Readiness is reported through
/// `health` once they have loaded; `handle` drives graceful shutdown.
pub async fn run_webhook_server<L: SecretLookup + 'static>(
    state: Arc<WebhookState<L>>,
    addr: SocketAddr,
    cert_path: &Path,
    key_path: &Path,
    handle: Handle,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;

    let health = state.health.clone();
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    info!(port = addr.port(), "Webhook server listening with TLS");
    if let Some(health) = &health {
        health.set_ready(true).await;
    }

    axum_server::bind_rustls(addr, config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
