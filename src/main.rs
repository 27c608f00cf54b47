//! secret-admission-webhook - validating admission webhook for Deployments.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Creates the Kubernetes client (once, shared by every lookup)
//! - Starts the health server and the TLS webhook server
//! - Drains in-flight reviews on SIGTERM/SIGINT

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kube::Client;
use tokio::signal;
use tracing::{error, info, warn};

use secret_admission_webhook::health::{HealthState, run_health_server};
use secret_admission_webhook::{
    ClusterSecretLookup, Config, ReviewDecoder, ValidationEngine, WebhookState, WorkloadDecoder,
    run_webhook_server,
};

/// Grace period for in-flight reviews to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("secret_admission_webhook=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!(
        port = config.port,
        cert = %config.tls_cert_path.display(),
        key = %config.tls_key_path.display(),
        lookup_timeout_secs = config.lookup_timeout_secs,
        "Starting secret-admission-webhook"
    );

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Create shared health state
    let health_state = Arc::new(HealthState::new());

    // Start health server immediately so liveness works before TLS is loaded
    let health_handle = {
        let health_state = health_state.clone();
        let addr = config.health_addr();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, addr).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let engine = ValidationEngine::new(
        WorkloadDecoder::new(),
        ClusterSecretLookup::new(client),
        config.lookup_timeout(),
    );
    let state = Arc::new(WebhookState::new(
        ReviewDecoder::new(),
        engine,
        Some(health_state.clone()),
    ));

    let server_handle = axum_server::Handle::new();
    let mut webhook_handle = {
        let server_handle = server_handle.clone();
        let addr = config.webhook_addr();
        let cert_path = config.tls_cert_path.clone();
        let key_path = config.tls_key_path.clone();
        tokio::spawn(async move {
            run_webhook_server(state, addr, &cert_path, &key_path, server_handle).await
        })
    };

    let mut failed = false;
    tokio::select! {
        result = &mut webhook_handle => {
            failed = true;
            match result {
                Ok(Ok(())) => error!("Webhook server exited unexpectedly"),
                Ok(Err(e)) => error!("Webhook server error: {}", e),
                Err(e) => error!("Webhook server task panicked: {}", e),
            }
        }
        result = health_handle => {
            failed = true;
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready so the Service stops routing reviews here
            health_state.set_ready(false).await;
            info!("Marked webhook as not ready");

            info!(
                "Waiting up to {}s for in-flight reviews to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            server_handle.graceful_shutdown(Some(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)));
            if let Err(e) = webhook_handle.await {
                error!("Webhook server task panicked: {}", e);
            }

            info!("Grace period complete, shutting down");
        }
    }

    info!("Webhook stopped");
    if failed {
        return Err("webhook terminated abnormally".into());
    }
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
