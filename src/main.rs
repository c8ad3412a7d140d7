//! TCP router configurer
//!
//! Keeps a TCP load balancer's configuration in line with the external port
//! mappings held by the routing API.
//!
//! # Architecture Overview
//!
//! ```text
//!                ┌──────────────────────────────────────────────────────────┐
//!                │                  ROUTER CONFIGURER                        │
//!                │                                                           │
//!  routing API   │  ┌─────────┐  events   ┌─────────┐       ┌─────────────┐  │
//!  ─────────────▶│  │ watcher │──────────▶│ updater │──────▶│routing table│  │
//!  (SSE + GET)   │  └────▲────┘  syncs    └────┬────┘       └─────────────┘  │
//!                │       │                     │ snapshot                     │
//!                │  ┌────┴────┐                ▼                              │
//!                │  │ syncer  │         ┌────────────┐   haproxy.cfg + reload │
//!                │  └─────────┘         │ configurer │──────────────────────────▶ HAProxy
//!                │                      └────────────┘                        │
//!  POST /v0/     │  ┌────────────┐            ▲                               │
//!  external_ports┼─▶│ api-server │────────────┘ (through the updater)         │
//!                │  └────────────┘                                           │
//!                └──────────────────────────────────────────────────────────┘
//! ```

use std::process::ExitCode;

use clap::Parser;

use tcp_router_configurer::config::{load_config, Cli};
use tcp_router_configurer::lifecycle;
use tcp_router_configurer::observability::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref(), |config| cli.apply(config)) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not up yet.
            eprintln!("router-configurer: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting");

    match lifecycle::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "exited-with-failure");
            ExitCode::FAILURE
        }
    }
}
