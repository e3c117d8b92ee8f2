use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::InnerState;

/// `OK` while the database answers, `503` otherwise.
pub async fn health_check(State(inner): State<InnerState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(&inner.db).await {
        Ok(_) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!("Health check failed: {:?}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Database unavailable")
        }
    }
}
