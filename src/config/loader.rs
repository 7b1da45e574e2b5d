//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{AdmissionConfig, ProxyConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then environment overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, ConfigError> {
    let config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ProxyConfig::default(),
    };

    let config = apply_env_overrides(config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Legacy names still read for each setting, after the current name.
const MAX_CONCURRENT_VARS: &[&str] = &["MAX_CONCURRENT_REQUESTS", "MAX_HTTP_CONNS"];
const MAX_ALLOC_VARS: &[&str] = &["TRANSFORM_MAX_ALLOC_MB", "VIPS_CACHE_MAX_MEM_MB"];
const ALLOWED_DOMAINS_VARS: &[&str] = &["ALLOWED_DOMAINS", "WHITELISTED_DOMAINS"];

/// Overlay environment values onto `config`.
///
/// Settings with a legacy name accept either; the current name wins when
/// both are set. Numeric variables are only honoured when they parse as a
/// positive integer; anything else leaves the current value in place. When
/// the worker count is overridden and the admission capacity is not, capacity
/// is re-derived from the new worker count.
pub fn apply_env_overrides<F>(mut config: ProxyConfig, lookup: F) -> ProxyConfig
where
    F: Fn(&str) -> Option<String>,
{
    let first = |keys: &[&str]| keys.iter().find_map(|key| lookup(key));
    let positive = |keys: &[&str]| -> Option<u64> {
        keys.iter().find_map(|key| {
            lookup(key)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
        })
    };

    if let Some(workers) = positive(&["MAX_WORKERS"]) {
        config.runtime.worker_threads = workers as usize;
        if first(MAX_CONCURRENT_VARS).is_none() {
            config.admission.max_concurrent = AdmissionConfig::capacity_for_workers(workers as usize);
        }
    }
    if let Some(max) = positive(MAX_CONCURRENT_VARS) {
        config.admission.max_concurrent = max as usize;
    }
    if let Some(ms) = positive(&["QUEUE_TIMEOUT_MS"]) {
        config.admission.queue_timeout_ms = ms;
    }
    if let Some(bytes) = positive(&["MAX_ORIGIN_BYTES"]) {
        config.origin.max_body_bytes = bytes as usize;
    }
    if let Some(mb) = positive(MAX_ALLOC_VARS) {
        config.transform.max_alloc_mb = mb;
    }

    if let Some(addr) = lookup("BIND_ADDRESS").filter(|s| !s.trim().is_empty()) {
        config.listener.bind_address = addr.trim().to_string();
    }
    if let Some(scheme) = lookup("ORIGIN_SCHEME").filter(|s| !s.trim().is_empty()) {
        config.origin.scheme = scheme.trim().to_ascii_lowercase();
    }
    if let Some(format) = lookup("LOG_FORMAT").filter(|s| !s.trim().is_empty()) {
        config.observability.log_format = format.trim().to_ascii_lowercase();
    }
    if let Some(domains) = first(ALLOWED_DOMAINS_VARS) {
        config.security.allowed_domains = domains
            .split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect();
    }

    config
}
