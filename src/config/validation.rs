//! Configuration validation.
//!
//! Semantic checks only; serde handles syntax. Every problem is collected so
//! an operator sees all of them at once.

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, returning every error found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.runtime.worker_threads == 0 {
        errors.push(ValidationError::new("runtime.worker_threads", "must be at least 1"));
    }
    if config.admission.max_concurrent == 0 {
        errors.push(ValidationError::new("admission.max_concurrent", "must be at least 1"));
    }
    if !matches!(config.origin.scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::new(
            "origin.scheme",
            format!("unsupported scheme '{}'", config.origin.scheme),
        ));
    }
    if config.origin.timeout_secs == 0 {
        errors.push(ValidationError::new("origin.timeout_secs", "must be greater than 0"));
    }
    if config.origin.max_body_bytes == 0 {
        errors.push(ValidationError::new("origin.max_body_bytes", "must be greater than 0"));
    }
    if config.transform.max_alloc_mb == 0 {
        errors.push(ValidationError::new("transform.max_alloc_mb", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("expected 'pretty' or 'json', got '{}'", config.observability.log_format),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ProxyConfig::default();
        config.admission.max_concurrent = 0;
        config.origin.scheme = "ftp".into();
        config.listener.bind_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["listener.bind_address", "admission.max_concurrent", "origin.scheme"]
        );
    }
}
