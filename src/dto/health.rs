use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether the priority network transport is reachable.
    pub connected: bool,
}

impl HealthResponse {
    /// Health response for the given connectivity flag: degraded means the
    /// service is running on the local mirror only.
    pub fn from_connectivity(connected: bool) -> Self {
        Self {
            status: if connected { "ok" } else { "degraded" }.to_string(),
            connected,
        }
    }
}
