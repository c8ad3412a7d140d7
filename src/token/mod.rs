//! Bearer token subsystem.
//!
//! # Data Flow
//! ```text
//! fetch_token(force_refresh)
//!     → cached token still valid (expiry minus buffer)? return it
//!     → refresh already in flight? await the same refresh
//!     → otherwise start one refresh (with retries) and share it
//! ```
//!
//! # Design Decisions
//! - At most one refresh in flight; every waiter gets its token or its error
//! - Tokens count as expired a configured buffer before their real expiry
//! - Auth can be disabled entirely with the no-op fetcher

pub mod noop;
pub mod uaa;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

pub use noop::NoOpTokenFetcher;
pub use uaa::UaaTokenFetcher;

/// A bearer token and the instant it stops being accepted.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    /// `None` for tokens that never expire.
    pub expires_at: Option<Instant>,
}

impl Token {
    pub fn new(value: impl Into<String>, expires_at: Option<Instant>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Build a token that expires `lifetime` after `now`. A lifetime past the
    /// clock's range yields a token that never expires.
    pub fn expiring_in(value: impl Into<String>, lifetime: Duration, now: Instant) -> Self {
        Self::new(value, now.checked_add(lifetime))
    }

    /// True once `now` is within `buffer` of the real expiry.
    pub fn is_expired(&self, buffer: Duration, now: Instant) -> bool {
        match self.expires_at {
            Some(expires_at) => now.checked_add(buffer).map_or(true, |t| t >= expires_at),
            None => false,
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't expose the token value in debug output
        f.debug_struct("Token")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Failure to obtain a token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid token endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("token request failed: {0}")]
    Request(String),

    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed token response: {0}")]
    Malformed(String),
}

impl AuthError {
    /// Transport failures and server errors are worth retrying; a rejected
    /// client or malformed endpoint is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthError::Request(_) | AuthError::Malformed(_) => true,
            AuthError::Rejected { status, .. } => *status >= 500,
            AuthError::InvalidEndpoint { .. } => false,
        }
    }
}

/// Supplies valid bearer tokens.
#[async_trait]
pub trait TokenFetcher: Send + Sync {
    /// Return a valid token, refreshing first when the cached one is expired
    /// or `force_refresh` is set.
    async fn fetch_token(&self, force_refresh: bool) -> Result<Token, AuthError>;
}
