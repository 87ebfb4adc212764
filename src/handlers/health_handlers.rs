//! Liveness and readiness probes

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::models::notification::NotificationStatus;
use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    db: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending: Option<i64>,
}

/// Liveness probe. The process is up.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Readiness probe. Verifies the notifications table is reachable and
/// reports the pending backlog, which is the first thing to look at when
/// deliveries stall.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let pending: Result<(i64,), _> =
        sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE status = ?")
            .bind(NotificationStatus::Pending as i32)
            .fetch_one(&state.db_pool)
            .await;

    match pending {
        Ok((count,)) => (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ok",
                db: "connected",
                pending: Some(count),
            }),
        )
            .into_response(),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "unavailable",
                db: "disconnected",
                pending: None,
            }),
        )
            .into_response(),
    }
}
