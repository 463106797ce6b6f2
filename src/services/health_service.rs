use tracing::warn;

use crate::{dao::adapter::PersistenceAdapter, dto::health::HealthResponse, state::SharedState};

/// Respond with the current health payload while logging mirror issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    if let Err(err) = state.adapters().mirror.probe().await {
        warn!(error = %err, "local mirror health check failed");
    }

    HealthResponse::from_connectivity(state.is_connected())
}
