//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router for the ad-hoc endpoint
//! - Wire up middleware (request ID, tracing, body limit)
//! - Serve until the shutdown handle fires

use std::sync::Arc;

use axum::{routing::post, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::http::handlers;
use crate::reconcile::Updater;

pub const EXTERNAL_PORTS_ROUTE: &str = "/v0/external_ports";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct ApiState {
    pub updater: Arc<Updater>,
}

/// Build the router with all middleware layers.
pub fn build_router(updater: Arc<Updater>, max_body_size: usize) -> Router {
    Router::new()
        .route(EXTERNAL_PORTS_ROUTE, post(handlers::map_external_port))
        .with_state(ApiState { updater })
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    pub fn new(updater: Arc<Updater>, config: &ApiConfig) -> Self {
        Self {
            router: build_router(updater, config.max_body_size),
        }
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "API server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("API server stopped");
        Ok(())
    }
}
