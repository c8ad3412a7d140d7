//! Control-plane (routing API) client subsystem.
//!
//! # Data Flow
//! ```text
//! Watcher ──subscribe(token)──▶ client.rs ──GET …/external_ports/events──▶ routing API
//!                                   │
//!                                   ▼
//!                      sse.rs (frames) → ChangeEvent stream
//!
//! Updater ──fetch_all(token)──▶ client.rs ──GET …/external_ports──▶ Vec<MappingRequest>
//! ```
//!
//! # Design Decisions
//! - Both operations take the token explicitly; refreshing is the caller's job
//! - A 401 is its own error so the caller knows to force a token refresh
//! - The event stream ends when the server closes the connection

pub mod client;
pub mod sse;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::routing::{ChangeEvent, MappingRequest};
use crate::token::Token;

pub use client::HttpRoutingApiClient;

/// Incremental change events; an `Err` item means the stream is broken.
pub type EventStream = BoxStream<'static, Result<ChangeEvent, TransportError>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid routing API endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("routing API rejected the bearer token")]
    Unauthorized,

    #[error("routing API request failed: {0}")]
    Request(String),

    #[error("routing API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("undecodable routing API payload: {0}")]
    Decode(String),

    #[error("event stream broken: {0}")]
    Stream(String),
}

impl TransportError {
    /// Everything but a malformed endpoint can heal by retrying later.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::InvalidEndpoint { .. })
    }
}

/// The control plane as seen by the reconciliation engine.
#[async_trait]
pub trait RoutingApiClient: Send + Sync {
    /// Open the change-event subscription.
    async fn subscribe(&self, token: &Token) -> Result<EventStream, TransportError>;

    /// Fetch the complete desired mapping.
    async fn fetch_all(&self, token: &Token) -> Result<Vec<MappingRequest>, TransportError>;
}
