use axum::extract::State;
use axum::http::StatusCode;

use crate::state::AppState;

// ── GET /readyz ──────────────────────────────────────────────────────────────

/// Readiness is a database ping; liveness is `mealdrop_core::health::healthz`.
pub async fn readyz(State(state): State<AppState>) -> StatusCode {
    match state.db.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness ping failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
