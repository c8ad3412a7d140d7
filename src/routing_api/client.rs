//! HTTP implementation of the routing API client.
//!
//! # Responsibilities
//! - Build endpoint URLs from the configured base URI and port
//! - Attach the bearer token
//! - Decode the full mapping list and the server-sent event stream

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, StatusCode};
use url::Url;

use crate::config::RoutingApiConfig;
use crate::routing::MappingRequest;
use crate::routing_api::sse::{decode_change_event, SseDecoder};
use crate::routing_api::{EventStream, RoutingApiClient, TransportError};
use crate::token::Token;

const EXTERNAL_PORTS_PATH: &str = "/routing/v1/external_ports";
const EVENTS_PATH: &str = "/routing/v1/external_ports/events";

pub struct HttpRoutingApiClient {
    client: reqwest::Client,
    fetch_url: Url,
    events_url: Url,
    request_timeout: Duration,
}

impl HttpRoutingApiClient {
    pub fn new(config: &RoutingApiConfig) -> Result<Self, TransportError> {
        let raw = format!("{}:{}", config.uri.trim_end_matches('/'), config.port);
        let invalid = |reason: String| TransportError::InvalidEndpoint {
            endpoint: raw.clone(),
            reason,
        };

        let base = Url::parse(&raw).map_err(|e| invalid(e.to_string()))?;
        let fetch_url = base
            .join(EXTERNAL_PORTS_PATH)
            .map_err(|e| invalid(e.to_string()))?;
        let events_url = base.join(EVENTS_PATH).map_err(|e| invalid(e.to_string()))?;

        // No overall timeout here: it would cut the long-lived event stream.
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            fetch_url,
            events_url,
            request_timeout: config.request_timeout(),
        })
    }

    pub fn fetch_url(&self) -> &Url {
        &self.fetch_url
    }

    pub fn events_url(&self) -> &Url {
        &self.events_url
    }
}

fn authorize(request: RequestBuilder, token: &Token) -> RequestBuilder {
    if token.value.is_empty() {
        request
    } else {
        request.header(AUTHORIZATION, format!("bearer {}", token.value))
    }
}

async fn check_status(response: Response) -> Result<Response, TransportError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED => Err(TransportError::Unauthorized),
        status => Err(TransportError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        }),
    }
}

#[async_trait]
impl RoutingApiClient for HttpRoutingApiClient {
    async fn subscribe(&self, token: &Token) -> Result<EventStream, TransportError> {
        let request = self
            .client
            .get(self.events_url.clone())
            .header(ACCEPT, "text/event-stream");

        let response = authorize(request, token)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let response = check_status(response).await?;

        tracing::debug!(url = %self.events_url, "event stream opened");

        let body = response.bytes_stream().boxed();
        let events = stream::unfold(
            (body, SseDecoder::new(), VecDeque::new(), false),
            |(mut body, mut decoder, mut pending, mut done)| async move {
                loop {
                    if let Some(item) = pending.pop_front() {
                        return Some((item, (body, decoder, pending, done)));
                    }
                    if done {
                        return None;
                    }
                    match body.next().await {
                        Some(Ok(chunk)) => match decoder.push(&chunk) {
                            Ok(frames) => {
                                pending.extend(frames.iter().filter_map(decode_change_event))
                            }
                            Err(e) => {
                                pending.push_back(Err(e));
                                done = true;
                            }
                        },
                        Some(Err(e)) => {
                            pending.push_back(Err(TransportError::Stream(e.to_string())));
                            done = true;
                        }
                        None => done = true,
                    }
                }
            },
        );

        Ok(events.boxed())
    }

    async fn fetch_all(&self, token: &Token) -> Result<Vec<MappingRequest>, TransportError> {
        let request = self
            .client
            .get(self.fetch_url.clone())
            .timeout(self.request_timeout);

        let response = authorize(request, token)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        check_status(response)
            .await?
            .json::<Vec<MappingRequest>>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}
