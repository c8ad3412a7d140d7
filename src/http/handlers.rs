use axum::{body::Bytes, extract::State, http::StatusCode};
use tracing::Instrument;

use crate::http::server::ApiState;
use crate::routing::MappingRequest;

/// `POST /v0/external_ports`: map external ports to backends immediately.
///
/// Malformed JSON and invalid fields are 400s, a failed apply is a 500. The
/// body of every response is empty.
pub async fn map_external_port(State(state): State<ApiState>, body: Bytes) -> StatusCode {
    async move {
        let requests: Vec<MappingRequest> = match serde_json::from_slice(&body) {
            Ok(requests) => requests,
            Err(e) => {
                tracing::error!(error = %e, "failed-to-unmarshal");
                return StatusCode::BAD_REQUEST;
            }
        };

        match state.updater.create_external_port_mappings(&requests).await {
            Ok(()) => {
                tracing::info!(mappings = requests.len(), "mapped-external-ports");
                StatusCode::OK
            }
            Err(e) if e.is_validation() => {
                tracing::error!(error = %e, "invalid-payload");
                StatusCode::BAD_REQUEST
            }
            Err(e) => {
                tracing::error!(error = %e, "failed-to-configure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
    .instrument(tracing::info_span!("map_external_port"))
    .await
}
