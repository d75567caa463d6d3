use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Respond with a health payload while logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_quiz_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "quiz store health check failed");
            }
        }
        Err(_) => warn!("quiz store unavailable (degraded mode)"),
    }

    let active_sessions = state.registry().len();
    if state.is_degraded() {
        HealthResponse::degraded(active_sessions)
    } else {
        HealthResponse::ok(active_sessions)
    }
}
