//! Command-line flags.
//!
//! Every tunable input can come from the config file or a flag; flags win.

use std::path::PathBuf;

use clap::Parser;

use crate::config::schema::RouterConfig;

#[derive(Debug, Parser)]
#[command(name = "router-configurer")]
#[command(about = "Keeps a TCP load balancer's routing configuration in sync with the routing API", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Seconds between full syncs of the routing table from the routing API.
    #[arg(long, value_name = "SECS")]
    pub sync_interval: Option<u64>,

    /// Seconds between retries to subscribe for events from the routing API.
    #[arg(long, value_name = "SECS")]
    pub subscription_retry_interval: Option<u64>,

    /// Maximum number of retries every time a token is fetched.
    #[arg(long)]
    pub token_fetch_max_retries: Option<u32>,

    /// Seconds to wait before retrying a failed token fetch.
    #[arg(long, value_name = "SECS")]
    pub token_fetch_retry_interval: Option<u64>,

    /// Seconds before actual expiry at which a token is considered expired.
    #[arg(long, value_name = "SECS")]
    pub token_fetch_expiration_buffer_time: Option<u64>,

    /// Base configuration holding the load balancer's header sections.
    #[arg(long)]
    pub tcp_load_balancer_base_config: Option<PathBuf>,

    /// Live load balancer configuration file.
    #[arg(long)]
    pub tcp_load_balancer_config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut RouterConfig) {
        if let Some(v) = self.sync_interval {
            config.sync.interval_secs = v;
        }
        if let Some(v) = self.subscription_retry_interval {
            config.sync.subscription_retry_interval_secs = v;
        }
        if let Some(v) = self.token_fetch_max_retries {
            config.token.max_retries = v;
        }
        if let Some(v) = self.token_fetch_retry_interval {
            config.token.retry_interval_secs = v;
        }
        if let Some(v) = self.token_fetch_expiration_buffer_time {
            config.token.expiration_buffer_secs = v;
        }
        if let Some(v) = &self.tcp_load_balancer_base_config {
            config.load_balancer.base_config_path = v.clone();
        }
        if let Some(v) = &self.tcp_load_balancer_config {
            config.load_balancer.config_path = v.clone();
        }
        if let Some(v) = &self.log_level {
            config.observability.log_level = v.clone();
        }
    }
}
