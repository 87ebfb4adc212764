//! Notification scheduling and lifecycle handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    models::notification::{Notification, TargetKind},
    services::{
        lifecycle::{self, ReschedulePatch},
        scheduler::{self, ScheduleEventParams, ScheduleSubtaskParams},
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateNotificationRequest {
    pub kind: String,
    pub entity_id: i64,
    /// Event recipients; sub-tasks derive theirs from the assignee
    #[serde(default)]
    pub recipients: Vec<i64>,
    pub offset_days: u32,
    pub time_of_day: String,
    pub created_by: i64,
    /// Operator test surface: explicit delivery instant
    #[serde(default)]
    pub override_at: Option<DateTime<Utc>>,
    /// Operator test surface: bypass the schedule guard
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateNotificationResponse {
    pub count: usize,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    #[serde(default)]
    pub offset_days: Option<u32>,
    #[serde(default)]
    pub time_of_day: Option<String>,
}

/// Schedules reminders for a sub-task or an event.
///
/// Events are fanned out to one record per recipient; the whole batch
/// succeeds or fails as a unit.
pub async fn create_notification(
    State(state): State<AppState>,
    Json(payload): Json<CreateNotificationRequest>,
) -> AppResult<impl IntoResponse> {
    let kind = TargetKind::parse(&payload.kind).ok_or_else(|| {
        AppError::Validation(format!("unknown kind '{}'", payload.kind))
    })?;

    let notifications = match kind {
        TargetKind::Subtask => {
            if !payload.recipients.is_empty() {
                return Err(AppError::Validation(
                    "sub-task recipients are derived from the assignee".to_string(),
                ));
            }
            let created = scheduler::schedule_subtask(
                &state.db_pool,
                &state.dispatch,
                ScheduleSubtaskParams {
                    subtask_id: payload.entity_id,
                    offset_days: payload.offset_days,
                    time_of_day: payload.time_of_day,
                    created_by: payload.created_by,
                    override_at: payload.override_at,
                    force: payload.force,
                },
            )
            .await?;
            vec![created]
        }
        TargetKind::Event => {
            scheduler::schedule_event(
                &state.db_pool,
                &state.dispatch,
                ScheduleEventParams {
                    event_id: payload.entity_id,
                    recipients: payload.recipients,
                    offset_days: payload.offset_days,
                    time_of_day: payload.time_of_day,
                    created_by: payload.created_by,
                    override_at: payload.override_at,
                    force: payload.force,
                },
            )
            .await?
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(CreateNotificationResponse {
            count: notifications.len(),
            notifications,
        }),
    ))
}

/// Returns a notification record, including its state and any recorded
/// failure reason.
pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let record = Notification::find(&state.db_pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("notification {id} not found")))?;

    Ok(Json(record))
}

/// Cancels a pending notification.
pub async fn cancel_notification(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    lifecycle::cancel(&state.db_pool, &state.dispatch, id).await?;
    Ok(Json(json!({"status": "cancelled"})))
}

/// Recomputes a pending notification's delivery instant.
pub async fn reschedule_notification(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<RescheduleRequest>,
) -> AppResult<impl IntoResponse> {
    let updated = lifecycle::reschedule(
        &state.db_pool,
        &state.dispatch,
        id,
        ReschedulePatch {
            offset_days: payload.offset_days,
            time_of_day: payload.time_of_day,
        },
    )
    .await?;

    Ok(Json(updated))
}
