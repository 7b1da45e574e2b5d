//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default upper bound on an origin response body (25 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 << 20;

/// Root configuration for the image proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Async runtime sizing.
    pub runtime: RuntimeConfig,

    /// Admission gate sizing.
    pub admission: AdmissionConfig,

    /// Outbound origin fetching.
    pub origin: OriginConfig,

    /// Egress allow-list.
    pub security: SecurityConfig,

    /// Transform engine limits.
    pub transform: TransformConfig,

    /// Cache headers on successful responses.
    pub cache: CacheConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Tokio runtime sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of worker threads driving request tasks.
    pub worker_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: available_cpus(),
        }
    }
}

/// Admission gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Maximum number of requests inside the pipeline at once.
    pub max_concurrent: usize,

    /// How long a request may wait for a free slot before 503.
    pub queue_timeout_ms: u64,
}

impl AdmissionConfig {
    /// Capacity derived from the worker count when none is configured.
    pub fn capacity_for_workers(workers: usize) -> usize {
        (workers * 2).max(4)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_concurrent: Self::capacity_for_workers(available_cpus()),
            queue_timeout_ms: 25_000,
        }
    }
}

/// Origin fetch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginConfig {
    /// URL scheme used to reach origins ("https" in production).
    pub scheme: String,

    /// Total per-fetch timeout covering connect and body read.
    pub timeout_secs: u64,

    /// Connect timeout, including the TLS handshake.
    pub connect_timeout_secs: u64,

    /// How long an idle pooled connection is kept.
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle pooled connections per origin host.
    pub pool_max_idle_per_host: usize,

    /// Hard cap on the origin response body.
    pub max_body_bytes: usize,

    /// Number of scratch buffers kept for reuse.
    pub buffer_pool_size: usize,

    /// Buffers that grew beyond this many bytes are freed instead of reused.
    pub buffer_retain_bytes: usize,

    /// User-Agent sent to origins.
    pub user_agent: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            timeout_secs: 12,
            connect_timeout_secs: 5,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 50,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            buffer_pool_size: 64,
            buffer_retain_bytes: 4 << 20,
            user_agent: concat!("image-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Egress security configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// Origin hostnames that may be fetched. Empty allows every host.
    pub allowed_domains: Vec<String>,
}

/// Transform engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Upper bound on decoder allocations, in MiB.
    pub max_alloc_mb: u64,

    /// Run a tiny image through every output format at startup.
    pub warm_up: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_alloc_mb: 512,
            warm_up: true,
        }
    }
}

/// Response caching headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// `max-age` advertised on transformed images.
    pub max_age_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        // 30 days
        Self { max_age_secs: 2_592_000 }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Overall deadline for a single request.
    pub request_secs: u64,

    /// How long in-flight requests may drain after a shutdown signal.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
