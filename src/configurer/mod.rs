//! Load balancer configuration subsystem.
//!
//! # Data Flow
//! ```text
//! RoutingTableSnapshot
//!     → haproxy.rs render (base template + one block per port)
//!     → write <config>.tmp
//!     → validate with the load balancer's own syntax check
//!     → rename over the live path (atomic)
//!     → graceful reload signal
//! ```
//!
//! # Design Decisions
//! - Rendering is a pure function of the snapshot: same table, same bytes
//! - The live path is only touched by the final rename
//! - A failed apply leaves the previously active configuration in effect
//! - Configurers are synchronous; callers move them onto blocking threads

pub mod haproxy;

use std::path::PathBuf;

use thiserror::Error;

use crate::routing::{
    validate_mapping_requests, MappingRequest, RoutingTableSnapshot, ValidationError,
};

pub use haproxy::HaProxyConfigurer;

/// Errors raised while rendering, validating or activating configuration.
#[derive(Debug, Error)]
pub enum ConfigureError {
    /// A mapping request failed field validation; nothing was applied.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The base configuration template could not be read.
    #[error("failed to read base configuration {path}: {source}")]
    BaseConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rendered configuration could not be written to its staging path.
    #[error("failed to write configuration {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external command could not be started.
    #[error("failed to run `{command}`: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The load balancer's syntax check rejected the staged configuration.
    #[error("load balancer rejected configuration {path}: {output}")]
    Invalid { path: PathBuf, output: String },

    /// The staged configuration could not replace the live one.
    #[error("failed to activate configuration {path}: {source}")]
    Swap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The new configuration is live but the reload signal failed.
    #[error("load balancer reload failed: {output}")]
    Reload { output: String },

    /// The blocking configuration task did not run to completion.
    #[error("configuration task aborted: {0}")]
    Aborted(String),
}

impl ConfigureError {
    pub fn is_validation(&self) -> bool {
        matches!(self, ConfigureError::Validation(_))
    }
}

/// Renders and activates load balancer configuration.
pub trait RouterConfigurer: Send + Sync {
    /// Render `snapshot`, validate it and make it the live configuration.
    fn configure(&self, snapshot: &RoutingTableSnapshot) -> Result<(), ConfigureError>;

    /// Validate every request, then apply them through [`configure`].
    /// The first invalid field aborts before any configuration attempt.
    ///
    /// [`configure`]: RouterConfigurer::configure
    fn create_external_port_mappings(
        &self,
        requests: &[MappingRequest],
    ) -> Result<(), ConfigureError> {
        validate_mapping_requests(requests)?;
        let snapshot: RoutingTableSnapshot = requests.iter().cloned().collect();
        self.configure(&snapshot)
    }
}
