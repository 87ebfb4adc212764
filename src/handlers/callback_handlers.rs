//! Inbound delivery callback handler

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::{error::AppResult, services::delivery, state::AppState};

/// Callback body posted by the dispatch facility.
///
/// Nothing in it is trusted beyond the notification id: the record and
/// all entity data are re-resolved from the store.
#[derive(Debug, Deserialize)]
pub struct DeliveryCallback {
    pub notification_id: i64,
    #[allow(dead_code)]
    pub kind: Option<String>,
    #[allow(dead_code)]
    pub entity_id: Option<i64>,
}

/// Executes a delivery. Transport failures are recorded on the record
/// and reported as a normal response so the facility does not retry
/// beyond its own bounded policy.
pub async fn handle_delivery(
    State(state): State<AppState>,
    Json(payload): Json<DeliveryCallback>,
) -> AppResult<impl IntoResponse> {
    info!("Delivery callback for notification {}", payload.notification_id);

    let outcome =
        delivery::deliver(&state.db_pool, &state.mailer, payload.notification_id).await?;

    Ok(Json(json!({ "status": outcome })))
}
