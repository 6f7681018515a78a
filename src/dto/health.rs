use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether a storage backend is currently installed and healthy.
    pub storage: bool,
}

impl HealthResponse {
    /// Build the payload from the degraded flag.
    pub fn from_degraded(degraded: bool) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            storage: !degraded,
        }
    }
}
