//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router
//! configurer. All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Control plane (routing API) location and auth mode.
    pub routing_api: RoutingApiConfig,

    /// OAuth client used to obtain bearer tokens.
    pub oauth: OAuthConfig,

    /// Load balancer configuration files and commands.
    pub load_balancer: LoadBalancerConfig,

    /// Ad-hoc mapping endpoint.
    pub api: ApiConfig,

    /// Full resync and resubscribe timing.
    pub sync: SyncConfig,

    /// Token fetch retry and expiry behaviour.
    pub token: TokenConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Routing API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingApiConfig {
    /// Base URI, scheme included (e.g., "http://routing-api.service.internal").
    pub uri: String,

    /// Routing API port.
    pub port: u16,

    /// Skip token acquisition entirely.
    pub auth_disabled: bool,

    /// Timeout for the full-fetch request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RoutingApiConfig {
    fn default() -> Self {
        Self {
            uri: "http://routing-api.service.cf.internal".to_string(),
            port: 3000,
            auth_disabled: false,
            request_timeout_secs: 10,
        }
    }
}

impl RoutingApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// OAuth client-credentials configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Token server base URI, scheme included.
    pub token_endpoint: String,

    /// Token server port.
    pub port: u16,

    /// OAuth client id.
    pub client_name: String,

    /// OAuth client secret.
    pub client_secret: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_endpoint: String::new(),
            port: 443,
            client_name: String::new(),
            client_secret: String::new(),
        }
    }
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Base template holding the fixed header sections.
    pub base_config_path: PathBuf,

    /// Live configuration file read by the load balancer.
    pub config_path: PathBuf,

    /// Syntax check command; the staged file path is appended.
    /// Empty disables validation.
    pub validate_command: Vec<String>,

    /// Graceful reload command. Empty disables reloading.
    pub reload_command: Vec<String>,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            base_config_path: PathBuf::new(),
            config_path: PathBuf::new(),
            validate_command: vec!["haproxy".to_string(), "-c".to_string(), "-f".to_string()],
            reload_command: vec!["/var/vcap/jobs/haproxy/bin/haproxy_reload".to_string()],
        }
    }
}

/// Ad-hoc mapping endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Serve the endpoint at all.
    pub enabled: bool,

    /// Bind address (e.g., "127.0.0.1:9999").
    pub bind_address: String,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:9999".to_string(),
            max_body_size: 1024 * 1024,
        }
    }
}

/// Sync and subscription timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Interval between full resyncs in seconds.
    pub interval_secs: u64,

    /// Wait between subscription attempts in seconds.
    pub subscription_retry_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            subscription_retry_interval_secs: 5,
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn subscription_retry_interval(&self) -> Duration {
        Duration::from_secs(self.subscription_retry_interval_secs)
    }
}

/// Token fetch behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Retries after the first failed attempt.
    pub max_retries: u32,

    /// Wait between attempts in seconds.
    pub retry_interval_secs: u64,

    /// Seconds before actual expiry at which a token counts as expired.
    pub expiration_buffer_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_interval_secs: 5,
            expiration_buffer_secs: 30,
        }
    }
}

impl TokenConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn expiration_buffer(&self) -> Duration {
        Duration::from_secs(self.expiration_buffer_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
