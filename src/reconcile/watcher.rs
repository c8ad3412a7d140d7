//! Control-plane subscription owner.
//!
//! # Responsibilities
//! - Keep one event subscription open, resubscribing after a fixed wait
//! - Feed change events and sync signals to the Updater
//! - Stop promptly on shutdown
//!
//! # States
//! ```text
//! Subscribing ──ok──▶ Streaming ──stream error / end──▶ Disconnected
//!      ▲    └──retryable error──────────────────────────▶    │
//!      └────────────────── retry interval elapsed ───────────┘
//! ```
//! A non-retryable subscription error ends the watcher with that error.
//!
//! Shutdown abandons a full sync still waiting on its token or fetch. An
//! apply already handed to the blocking pool runs to completion.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{broadcast, mpsc};

use crate::observability::metrics;
use crate::reconcile::Updater;
use crate::routing_api::{EventStream, RoutingApiClient, TransportError};
use crate::token::TokenFetcher;

enum State {
    Disconnected { force_refresh: bool },
    Subscribing { force_refresh: bool },
    Streaming(EventStream),
}

pub struct Watcher {
    updater: Arc<Updater>,
    routing_api: Arc<dyn RoutingApiClient>,
    token_fetcher: Arc<dyn TokenFetcher>,
    sync_rx: mpsc::Receiver<()>,
    retry_interval: Duration,
}

impl Watcher {
    pub fn new(
        updater: Arc<Updater>,
        routing_api: Arc<dyn RoutingApiClient>,
        token_fetcher: Arc<dyn TokenFetcher>,
        sync_rx: mpsc::Receiver<()>,
        retry_interval: Duration,
    ) -> Self {
        Self {
            updater,
            routing_api,
            token_fetcher,
            sync_rx,
            retry_interval,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), TransportError> {
        let Watcher {
            updater,
            routing_api,
            token_fetcher,
            mut sync_rx,
            retry_interval,
        } = self;

        tracing::info!(retry_interval = ?retry_interval, "watcher started");

        let mut state = State::Subscribing {
            force_refresh: false,
        };

        loop {
            state = match state {
                State::Disconnected { force_refresh } => {
                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(retry_interval) => State::Subscribing { force_refresh },
                    }
                }

                State::Subscribing { force_refresh } => {
                    let attempt = subscribe(token_fetcher.as_ref(), routing_api.as_ref(), force_refresh);
                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => break,
                        result = attempt => match result {
                            Ok(events) => {
                                tracing::info!("subscribed");
                                metrics::record_subscription(true);
                                State::Streaming(events)
                            }
                            Err(Failure::Auth(e)) => {
                                tracing::error!(error = %e, "subscribe-failed");
                                metrics::record_subscription(false);
                                State::Disconnected { force_refresh: false }
                            }
                            Err(Failure::Transport(e)) if !e.is_retryable() => {
                                tracing::error!(error = %e, "subscribe-failed");
                                metrics::record_subscription(false);
                                return Err(e);
                            }
                            Err(Failure::Transport(e)) => {
                                tracing::error!(error = %e, "subscribe-failed");
                                metrics::record_subscription(false);
                                State::Disconnected {
                                    force_refresh: e == TransportError::Unauthorized,
                                }
                            }
                        },
                    }
                }

                State::Streaming(mut events) => {
                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => break,
                        Some(()) = sync_rx.recv() => {
                            tokio::select! {
                                biased;
                                _ = shutdown.recv() => break,
                                // Failures are logged inside; the next tick retries.
                                _ = updater.sync() => State::Streaming(events),
                            }
                        }
                        next = events.next() => match next {
                            Some(Ok(event)) => {
                                let _ = updater.handle_event(event).await;
                                State::Streaming(events)
                            }
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "event-stream-failed");
                                State::Disconnected {
                                    force_refresh: e == TransportError::Unauthorized,
                                }
                            }
                            None => {
                                tracing::warn!("event-stream-closed");
                                State::Disconnected { force_refresh: false }
                            }
                        },
                    }
                }
            };
        }

        tracing::info!("watcher stopped");
        Ok(())
    }
}

enum Failure {
    Auth(crate::token::AuthError),
    Transport(TransportError),
}

async fn subscribe(
    token_fetcher: &dyn TokenFetcher,
    routing_api: &dyn RoutingApiClient,
    force_refresh: bool,
) -> Result<EventStream, Failure> {
    let token = token_fetcher
        .fetch_token(force_refresh)
        .await
        .map_err(Failure::Auth)?;
    routing_api
        .subscribe(&token)
        .await
        .map_err(Failure::Transport)
}
