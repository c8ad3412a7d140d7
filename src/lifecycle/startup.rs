//! Startup orchestration.
//!
//! # Responsibilities
//! - Build every subsystem from the validated configuration, in dependency order
//! - Bind the ad-hoc endpoint listener before anything starts
//! - Hand the long-running tasks to the supervisor
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::RouterConfig;
use crate::configurer::{ConfigureError, HaProxyConfigurer, RouterConfigurer};
use crate::http::ApiServer;
use crate::lifecycle::{Error as SupervisorError, Supervisor};
use crate::reconcile::{sync_channel, Syncer, Updater, Watcher};
use crate::routing_api::{HttpRoutingApiClient, RoutingApiClient, TransportError};
use crate::token::{AuthError, NoOpTokenFetcher, TokenFetcher, UaaTokenFetcher};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to initialize load balancer configurer: {0}")]
    Configurer(#[from] ConfigureError),

    #[error("failed to initialize token fetcher: {0}")]
    TokenFetcher(#[from] AuthError),

    #[error("failed to initialize routing API client: {0}")]
    RoutingApi(#[from] TransportError),

    #[error("invalid API bind address {address}: {reason}")]
    BindAddress { address: String, reason: String },

    #[error("failed to bind API listener on {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

/// Collaborators the reconciliation engine is built from.
pub struct Components {
    pub configurer: Arc<dyn RouterConfigurer>,
    pub token_fetcher: Arc<dyn TokenFetcher>,
    pub routing_api: Arc<dyn RoutingApiClient>,
}

impl Components {
    /// Build the production collaborators from `config`.
    pub fn from_config(config: &RouterConfig) -> Result<Self, StartupError> {
        let configurer = Arc::new(HaProxyConfigurer::new(&config.load_balancer)?);

        let token_fetcher: Arc<dyn TokenFetcher> = if config.routing_api.auth_disabled {
            tracing::debug!("creating no-op token fetcher");
            Arc::new(NoOpTokenFetcher::new())
        } else {
            tracing::debug!("creating UAA token fetcher");
            Arc::new(UaaTokenFetcher::new(
                &config.oauth,
                &config.token,
                &config.routing_api,
            )?)
        };

        let routing_api = Arc::new(HttpRoutingApiClient::new(&config.routing_api)?);
        tracing::debug!(
            api_location = %routing_api.fetch_url(),
            "created routing API client"
        );

        Ok(Self {
            configurer,
            token_fetcher,
            routing_api,
        })
    }
}

/// Build the supervised group (`api-server`, `watcher`, `syncer`) around
/// `components`. The API listener is bound here so a bad address fails startup.
pub async fn build(config: &RouterConfig, components: Components) -> Result<Supervisor, StartupError> {
    let Components {
        configurer,
        token_fetcher,
        routing_api,
    } = components;

    let updater = Arc::new(Updater::new(
        configurer,
        routing_api.clone(),
        token_fetcher.clone(),
    ));

    let mut supervisor = Supervisor::new();

    if config.api.enabled {
        let address: SocketAddr =
            config
                .api
                .bind_address
                .parse()
                .map_err(|e: std::net::AddrParseError| StartupError::BindAddress {
                    address: config.api.bind_address.clone(),
                    reason: e.to_string(),
                })?;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| StartupError::Bind { address, source })?;
        let server = ApiServer::new(updater.clone(), &config.api);
        supervisor = supervisor.member("api-server", move |shutdown| server.run(listener, shutdown));
    }

    let (sync_tx, sync_rx) = sync_channel();
    let watcher = Watcher::new(
        updater,
        routing_api,
        token_fetcher,
        sync_rx,
        config.sync.subscription_retry_interval(),
    );
    let syncer = Syncer::new(config.sync.interval(), sync_tx);

    Ok(supervisor
        .member("watcher", move |shutdown| watcher.run(shutdown))
        .member("syncer", move |shutdown| syncer.run(shutdown)))
}

/// Start everything and block until shutdown.
pub async fn run(config: RouterConfig) -> Result<(), StartupError> {
    let components = Components::from_config(&config)?;
    let supervisor = build(&config, components).await?;

    tracing::info!(members = ?supervisor.names(), "started");
    supervisor.run().await?;
    tracing::info!("exited");
    Ok(())
}
