//! Token fetcher used when the routing API runs without auth.

use async_trait::async_trait;

use crate::token::{AuthError, Token, TokenFetcher};

#[derive(Debug, Default, Clone)]
pub struct NoOpTokenFetcher;

impl NoOpTokenFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TokenFetcher for NoOpTokenFetcher {
    async fn fetch_token(&self, _force_refresh: bool) -> Result<Token, AuthError> {
        Ok(Token::new("", None))
    }
}
