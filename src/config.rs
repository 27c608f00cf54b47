//! Startup configuration.
//!
//! Every setting can be given as a command-line flag or an environment
//! variable, and falls back to a default that matches the stock deployment
//! manifests (certificates mounted at `/etc/certs`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Default webhook server port
pub const DEFAULT_WEBHOOK_PORT: u16 = 8443;
/// Default health/metrics server port
pub const DEFAULT_HEALTH_PORT: u16 = 8080;
/// Default path to webhook TLS certificate
pub const DEFAULT_TLS_CERT_PATH: &str = "/etc/certs/tls.crt";
/// Default path to webhook TLS private key
pub const DEFAULT_TLS_KEY_PATH: &str = "/etc/certs/tls.key";
/// Default deadline for all secret lookups of a single review.
///
/// Kept below the API server's default webhook timeout of 10s so a stalled
/// lookup still produces a denial instead of a caller-side timeout.
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 5;

/// Command-line and environment configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "secret-admission-webhook")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Port the TLS webhook server listens on
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = DEFAULT_WEBHOOK_PORT)]
    pub port: u16,

    /// Absolute path to the TLS certificate (PEM)
    #[arg(
        long,
        alias = "tlsCertPath",
        env = "TLS_CERT_PATH",
        default_value = DEFAULT_TLS_CERT_PATH
    )]
    pub tls_cert_path: PathBuf,

    /// Absolute path to the TLS private key (PEM)
    #[arg(
        long,
        alias = "tlsKeyPath",
        env = "TLS_KEY_PATH",
        default_value = DEFAULT_TLS_KEY_PATH
    )]
    pub tls_key_path: PathBuf,

    /// Port for the plain-HTTP health and metrics server
    #[arg(long, env = "HEALTH_PORT", default_value_t = DEFAULT_HEALTH_PORT)]
    pub health_port: u16,

    /// Deadline in seconds for all secret lookups of one admission review
    #[arg(
        long,
        env = "LOOKUP_TIMEOUT_SECS",
        default_value_t = DEFAULT_LOOKUP_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub lookup_timeout_secs: u64,
}

impl Config {
    /// Address the webhook server binds to
    pub fn webhook_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// Address the health server binds to
    pub fn health_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.health_port))
    }

    /// Lookup deadline as a `Duration`
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}
