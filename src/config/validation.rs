//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, ports valid)
//! - Require OAuth settings unless auth is disabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::RouterConfig;

/// One semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
        return;
    }
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme {}", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, e.to_string())),
    }
}

pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url(&mut errors, "routing_api.uri", &config.routing_api.uri);
    if config.routing_api.port == 0 {
        errors.push(ValidationError::new("routing_api.port", "must be greater than 0"));
    }
    if config.routing_api.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "routing_api.request_timeout_secs",
            "must be greater than 0",
        ));
    }

    if !config.routing_api.auth_disabled {
        check_url(&mut errors, "oauth.token_endpoint", &config.oauth.token_endpoint);
        if config.oauth.port == 0 {
            errors.push(ValidationError::new("oauth.port", "must be greater than 0"));
        }
        if config.oauth.client_name.is_empty() {
            errors.push(ValidationError::new("oauth.client_name", "must not be empty"));
        }
    }

    if config.load_balancer.base_config_path.as_os_str().is_empty() {
        errors.push(ValidationError::new(
            "load_balancer.base_config_path",
            "must not be empty",
        ));
    }
    if config.load_balancer.config_path.as_os_str().is_empty() {
        errors.push(ValidationError::new("load_balancer.config_path", "must not be empty"));
    }

    if config.api.enabled && config.api.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "api.bind_address",
            format!("invalid socket address {}", config.api.bind_address),
        ));
    }

    if config.sync.interval_secs == 0 {
        errors.push(ValidationError::new("sync.interval_secs", "must be greater than 0"));
    }
    if config.sync.subscription_retry_interval_secs == 0 {
        errors.push(ValidationError::new(
            "sync.subscription_retry_interval_secs",
            "must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
