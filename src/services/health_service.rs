use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether a healthy storage backend is installed, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().require().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(err) => warn!(error = %err, "storage unavailable"),
    }

    HealthResponse::from_degraded(state.is_degraded().await)
}
