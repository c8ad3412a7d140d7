//! OAuth2 client-credentials token fetcher (UAA).
//!
//! # Responsibilities
//! - Obtain tokens with the client-credentials grant
//! - Cache the current token until it enters the expiration buffer
//! - Retry transient failures a bounded number of times
//! - Collapse concurrent refreshes into one request

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;
use tokio::time::Instant;
use url::Url;

use crate::config::{OAuthConfig, RoutingApiConfig, TokenConfig};
use crate::token::{AuthError, Token, TokenFetcher};

type SharedRefresh = Shared<BoxFuture<'static, Result<Token, AuthError>>>;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds until expiry.
    expires_in: u64,
}

struct Endpoint {
    client: reqwest::Client,
    token_url: Url,
    client_name: String,
    client_secret: String,
    max_retries: u32,
    retry_interval: Duration,
}

#[derive(Default)]
struct State {
    cached: Option<Token>,
    in_flight: Option<SharedRefresh>,
}

pub struct UaaTokenFetcher {
    endpoint: Arc<Endpoint>,
    expiration_buffer: Duration,
    state: Mutex<State>,
}

impl UaaTokenFetcher {
    pub fn new(
        oauth: &OAuthConfig,
        token: &TokenConfig,
        routing_api: &RoutingApiConfig,
    ) -> Result<Self, AuthError> {
        let raw = format!("{}:{}/oauth/token", oauth.token_endpoint.trim_end_matches('/'), oauth.port);
        let token_url = Url::parse(&raw).map_err(|e| AuthError::InvalidEndpoint {
            endpoint: raw.clone(),
            reason: e.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(routing_api.request_timeout())
            .build()
            .map_err(|e| AuthError::Request(e.to_string()))?;

        Ok(Self {
            endpoint: Arc::new(Endpoint {
                client,
                token_url,
                client_name: oauth.client_name.clone(),
                client_secret: oauth.client_secret.clone(),
                max_retries: token.max_retries,
                retry_interval: token.retry_interval(),
            }),
            expiration_buffer: token.expiration_buffer(),
            state: Mutex::new(State::default()),
        })
    }

    pub fn token_url(&self) -> &Url {
        &self.endpoint.token_url
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TokenFetcher for UaaTokenFetcher {
    async fn fetch_token(&self, force_refresh: bool) -> Result<Token, AuthError> {
        let refresh = {
            let mut state = self.state();

            if !force_refresh {
                if let Some(token) = &state.cached {
                    if !token.is_expired(self.expiration_buffer, Instant::now()) {
                        return Ok(token.clone());
                    }
                }
            }

            match &state.in_flight {
                Some(refresh) => refresh.clone(),
                None => {
                    let endpoint = self.endpoint.clone();
                    let refresh = async move { endpoint.fetch_with_retry().await }
                        .boxed()
                        .shared();
                    state.in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };

        let result = refresh.clone().await;

        // First waiter back publishes the outcome; later ones find it cleared.
        let mut state = self.state();
        if state
            .in_flight
            .as_ref()
            .is_some_and(|current| current.ptr_eq(&refresh))
        {
            state.in_flight = None;
            if let Ok(token) = &result {
                state.cached = Some(token.clone());
            }
        }

        result
    }
}

impl Endpoint {
    async fn fetch_with_retry(&self) -> Result<Token, AuthError> {
        let mut attempt = 0;
        loop {
            match self.request_token().await {
                Ok(token) => {
                    tracing::debug!(attempt, "fetched token");
                    return Ok(token);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_retries = self.max_retries,
                        "token fetch failed, retrying"
                    );
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, attempt, "token fetch failed");
                    return Err(e);
                }
            }
        }
    }

    async fn request_token(&self) -> Result<Token, AuthError> {
        let response = self
            .client
            .post(self.token_url.clone())
            .basic_auth(&self.client_name, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Malformed(e.to_string()))?;

        Ok(Token::expiring_in(
            body.access_token,
            Duration::from_secs(body.expires_in),
            Instant::now(),
        ))
    }
}
