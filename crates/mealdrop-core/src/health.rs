use axum::http::StatusCode;

/// Handler for `GET /healthz`. Liveness only, touches nothing.
///
/// Readiness (`GET /readyz`) lives in the service, where the database
/// handle is available for a ping.
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}
