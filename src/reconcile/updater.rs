//! The single writer of the routing table.
//!
//! # Responsibilities
//! - Apply change events and report whether they changed anything
//! - Converge the table to the control plane's full snapshot
//! - Apply configuration after every effective change
//! - Serve ad-hoc mapping requests from the HTTP endpoint

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::Instrument;

use crate::configurer::{ConfigureError, RouterConfigurer};
use crate::observability::metrics;
use crate::routing::{
    validate_mapping_requests, Action, ChangeEvent, MappingRequest, ReconcileDiff, RoutingTable,
    RoutingTableSnapshot,
};
use crate::routing_api::{RoutingApiClient, TransportError};
use crate::token::{AuthError, TokenFetcher};

/// Why a full sync did not complete.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to obtain token: {0}")]
    Auth(#[from] AuthError),

    #[error("failed to fetch routes: {0}")]
    Transport(#[from] TransportError),

    /// The table was reconciled but the new configuration was not applied.
    #[error("failed to apply reconciled table: {0}")]
    Configure(#[from] ConfigureError),
}

pub struct Updater {
    table: RoutingTable,
    configurer: Arc<dyn RouterConfigurer>,
    routing_api: Arc<dyn RoutingApiClient>,
    token_fetcher: Arc<dyn TokenFetcher>,
    /// Held for the whole of each mutation, fetch included.
    writer: Mutex<()>,
    /// Held for the whole of each apply.
    apply: Mutex<()>,
    /// Set when the routing API rejected our token during a fetch.
    force_token_refresh: AtomicBool,
}

impl Updater {
    pub fn new(
        configurer: Arc<dyn RouterConfigurer>,
        routing_api: Arc<dyn RoutingApiClient>,
        token_fetcher: Arc<dyn TokenFetcher>,
    ) -> Self {
        Self {
            table: RoutingTable::new(),
            configurer,
            routing_api,
            token_fetcher,
            writer: Mutex::new(()),
            apply: Mutex::new(()),
            force_token_refresh: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> RoutingTableSnapshot {
        self.table.snapshot()
    }

    /// Apply one change event. Returns whether the table changed; an
    /// unchanged table is never reconfigured.
    pub async fn handle_event(&self, event: ChangeEvent) -> Result<bool, ConfigureError> {
        let span = tracing::info_span!(
            "handle_event",
            action = event.action.as_str(),
            port = event.mapping.external_port
        );
        self.apply_event(event).instrument(span).await
    }

    async fn apply_event(&self, event: ChangeEvent) -> Result<bool, ConfigureError> {
        let ChangeEvent { action, mapping } = event;

        let changed = {
            let _writer = self.writer.lock().await;
            match action {
                Action::Upsert => {
                    if let Err(e) = mapping.validate() {
                        tracing::warn!(error = %e, "invalid-event");
                        return Ok(false);
                    }
                    self.table.set(mapping.external_port, mapping.backends)
                }
                Action::Delete => self.table.remove(mapping.external_port),
            }
        };
        metrics::record_event(action, changed);

        if !changed {
            tracing::debug!("routing-table-unchanged");
            return Ok(false);
        }

        tracing::info!("routing-table-updated");
        match self.configure().await {
            Ok(()) => Ok(true),
            Err(e) => {
                tracing::error!(error = %e, "failed-to-configure");
                Err(e)
            }
        }
    }

    /// Converge the table to the control plane's full mapping.
    ///
    /// On a token or fetch failure nothing is mutated; the next scheduled
    /// sync is the retry.
    pub async fn sync(&self) -> Result<ReconcileDiff, SyncError> {
        self.sync_inner().instrument(tracing::info_span!("sync")).await
    }

    async fn sync_inner(&self) -> Result<ReconcileDiff, SyncError> {
        let diff = {
            let _writer = self.writer.lock().await;

            let force_refresh = self.force_token_refresh.swap(false, Ordering::SeqCst);
            let token = match self.token_fetcher.fetch_token(force_refresh).await {
                Ok(token) => token,
                Err(e) => {
                    tracing::error!(error = %e, "sync-failed");
                    metrics::record_sync("failed");
                    return Err(e.into());
                }
            };

            let mappings = match self.routing_api.fetch_all(&token).await {
                Ok(mappings) => mappings,
                Err(e) => {
                    if e == TransportError::Unauthorized {
                        self.force_token_refresh.store(true, Ordering::SeqCst);
                    }
                    tracing::error!(error = %e, "sync-failed");
                    metrics::record_sync("failed");
                    return Err(e.into());
                }
            };

            let desired: RoutingTableSnapshot = mappings
                .into_iter()
                .filter(|mapping| match mapping.validate() {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(port = mapping.external_port, error = %e, "invalid-mapping");
                        false
                    }
                })
                .collect();

            self.table.reconcile_to(&desired)
        };

        if diff.is_empty() {
            tracing::debug!("routing-table-in-sync");
            metrics::record_sync("unchanged");
            return Ok(diff);
        }

        tracing::info!(
            added = ?diff.added,
            removed = ?diff.removed,
            updated = ?diff.updated,
            "routing-table-reconciled"
        );
        metrics::record_sync("changed");

        if let Err(e) = self.configure().await {
            tracing::error!(error = %e, "failed-to-configure");
            return Err(e.into());
        }
        Ok(diff)
    }

    /// Ad-hoc path: validate every request, record them in the table, then
    /// apply the whole table. An invalid request mutates nothing.
    ///
    /// The table keeps the update even when applying it fails.
    pub async fn create_external_port_mappings(
        &self,
        requests: &[MappingRequest],
    ) -> Result<(), ConfigureError> {
        validate_mapping_requests(requests)?;

        {
            let _writer = self.writer.lock().await;
            for request in requests {
                self.table
                    .set(request.external_port, request.backends.iter().cloned());
            }
        }

        let _apply = self.apply.lock().await;
        let snapshot = self.table.snapshot();
        metrics::set_routing_table_ports(snapshot.len());

        let configurer = self.configurer.clone();
        let result = run_blocking(move || {
            configurer.create_external_port_mappings(&snapshot.to_mapping_requests())
        })
        .await;
        metrics::record_configure(result.is_ok());
        result
    }

    async fn configure(&self) -> Result<(), ConfigureError> {
        let _apply = self.apply.lock().await;
        let snapshot = self.table.snapshot();
        metrics::set_routing_table_ports(snapshot.len());

        let configurer = self.configurer.clone();
        let result = run_blocking(move || configurer.configure(&snapshot)).await;
        metrics::record_configure(result.is_ok());
        result
    }
}

/// Run a configurer call on the blocking pool. Dropping the returned future
/// does not stop the call.
async fn run_blocking<F>(f: F) -> Result<(), ConfigureError>
where
    F: FnOnce() -> Result<(), ConfigureError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(ConfigureError::Aborted(e.to_string())))
}
