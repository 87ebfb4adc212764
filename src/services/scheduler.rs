//! Batch creation of notification records with compensating rollback
//!
//! One record is inserted per recipient, then enqueued with the dispatch
//! facility. The row always exists before the enqueue call so the later
//! delivery callback can resolve it; a failed enqueue deletes the fresh
//! row again. Multi-recipient batches are all-or-nothing from the
//! caller's point of view.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::models::entity::{self, Event, Subtask};
use crate::models::notification::{Notification, NotificationStatus, TargetKind};
use crate::services::clock;
use crate::services::dispatch::{DispatchClient, DispatchPayload};

#[derive(Debug, Clone)]
pub struct ScheduleSubtaskParams {
    pub subtask_id: i64,
    pub offset_days: u32,
    pub time_of_day: String,
    pub created_by: i64,
    /// Operator test surface: explicit delivery instant
    pub override_at: Option<DateTime<Utc>>,
    /// Operator test surface: bypass the schedule guard
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct ScheduleEventParams {
    pub event_id: i64,
    pub recipients: Vec<i64>,
    pub offset_days: u32,
    pub time_of_day: String,
    pub created_by: i64,
    pub override_at: Option<DateTime<Utc>>,
    pub force: bool,
}

/// Deduplication key for the external facility.
///
/// Deterministic for retries of the same logical request; the scheduled
/// instant acts as the freshness token distinguishing genuinely new
/// requests for the same entity.
fn dedup_key(
    kind: TargetKind,
    entity_id: i64,
    recipient_id: i64,
    offset_days: u32,
    instant: DateTime<Utc>,
) -> String {
    format!(
        "{}:{entity_id}:{recipient_id}:{offset_days}:{}",
        kind.as_str(),
        instant.timestamp()
    )
}

/// Resolves the delivery instant for a scheduling request.
///
/// An explicit override instant skips the guard; so does `force`, which
/// still validates that the instant is computable.
fn resolve_instant(
    deadline: DateTime<Utc>,
    offset_days: u32,
    time_of_day: &str,
    override_at: Option<DateTime<Utc>>,
    force: bool,
) -> AppResult<DateTime<Utc>> {
    if let Some(at) = override_at {
        return Ok(at);
    }

    let instant = clock::compute_delivery_instant(deadline, offset_days, time_of_day)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if !force && !clock::can_schedule(deadline, offset_days, time_of_day) {
        return Err(AppError::PastSchedule(format!(
            "delivery instant {instant} is not far enough in the future"
        )));
    }

    Ok(instant)
}

/// Inserts one pending record and enqueues its delayed message.
///
/// On enqueue failure the just-inserted row is deleted: an orphaned
/// pending row with no handle would never fire.
async fn create_and_enqueue(
    db_pool: &SqlitePool,
    dispatch: &DispatchClient,
    record: Notification,
    instant: DateTime<Utc>,
    kind: TargetKind,
) -> AppResult<Notification> {
    let inserted = record.insert(db_pool).await?;
    let Some(id) = inserted.id else {
        return Err(AppError::Internal("insert returned no id".to_string()));
    };

    let payload = DispatchPayload {
        notification_id: id,
        kind: inserted.kind.clone(),
        entity_id: inserted.entity_id,
    };
    let key = dedup_key(
        kind,
        inserted.entity_id,
        inserted.recipient_id,
        u32::try_from(inserted.offset_days).unwrap_or(0),
        instant,
    );

    match dispatch.enqueue(&payload, instant, &key).await {
        Ok(handle) => {
            if let Err(e) = Notification::store_handle(db_pool, id, &handle).await {
                dispatch.cancel(&handle).await;
                if let Err(del) = Notification::delete(db_pool, id).await {
                    error!("Rollback delete failed for notification {id}: {del:?}");
                }
                return Err(e.into());
            }
            Ok(Notification {
                external_handle: Some(handle),
                ..inserted
            })
        }
        Err(e) => {
            if let Err(del) = Notification::delete(db_pool, id).await {
                error!("Rollback delete failed for notification {id}: {del:?}");
            }
            Err(e)
        }
    }
}

/// Undoes every record created earlier in a failed batch.
///
/// The compensation is idempotent: cancelling an already-cancelled
/// handle is a no-op and deletes are retried best-effort.
async fn rollback_batch(db_pool: &SqlitePool, dispatch: &DispatchClient, created: &[Notification]) {
    for record in created.iter().rev() {
        if let Some(handle) = &record.external_handle {
            dispatch.cancel(handle).await;
        }
        if let Some(id) = record.id {
            if let Err(e) = Notification::delete(db_pool, id).await {
                error!("Batch rollback delete failed for notification {id}: {e:?}");
            }
        }
    }
}

fn batch_failure(recipient_id: i64, cause: &AppError) -> AppError {
    let message = format!("scheduling failed for recipient {recipient_id}: {cause}");
    match cause {
        AppError::Dispatch(_) => AppError::Dispatch(message),
        _ => AppError::Internal(message),
    }
}

fn pending_record(
    kind: TargetKind,
    entity_id: i64,
    recipient_id: i64,
    project_id: i64,
    offset_days: u32,
    time_of_day: &str,
    instant: DateTime<Utc>,
    created_by: i64,
) -> Notification {
    Notification {
        id: None,
        kind: kind.as_str().to_string(),
        entity_id,
        recipient_id,
        project_id,
        offset_days: i64::from(offset_days),
        time_of_day: time_of_day.to_string(),
        scheduled_for: instant,
        status: NotificationStatus::Pending as i32,
        external_handle: None,
        delivery_ref: None,
        error: None,
        sent_at: None,
        created_by,
    }
}

/// Schedules a reminder for a sub-task's single assignee.
pub async fn schedule_subtask(
    db_pool: &SqlitePool,
    dispatch: &DispatchClient,
    params: ScheduleSubtaskParams,
) -> AppResult<Notification> {
    let subtask = Subtask::find(db_pool, params.subtask_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("sub-task {} not found", params.subtask_id)))?;

    let deadline = subtask.deadline.ok_or_else(|| {
        AppError::Validation(format!("sub-task {} has no deadline", subtask.id))
    })?;
    let assignee_id = subtask.assignee_id.ok_or_else(|| {
        AppError::Validation(format!("sub-task {} has no assignee", subtask.id))
    })?;

    let instant = resolve_instant(
        deadline,
        params.offset_days,
        &params.time_of_day,
        params.override_at,
        params.force,
    )?;

    if clock::is_effectively_past(instant) {
        info!(
            "Delivery instant for sub-task {} is within the grace buffer, firing at minimum delay",
            subtask.id
        );
    }

    let record = pending_record(
        TargetKind::Subtask,
        subtask.id,
        assignee_id,
        subtask.project_id,
        params.offset_days,
        &params.time_of_day,
        instant,
        params.created_by,
    );

    let created = create_and_enqueue(db_pool, dispatch, record, instant, TargetKind::Subtask).await?;
    info!(
        "Scheduled sub-task reminder {} for {}",
        created.id.unwrap_or_default(),
        instant
    );
    Ok(created)
}

/// Schedules reminders for an event, fanned out to one record per
/// recipient. All-or-nothing: any failure rolls back the whole batch.
pub async fn schedule_event(
    db_pool: &SqlitePool,
    dispatch: &DispatchClient,
    params: ScheduleEventParams,
) -> AppResult<Vec<Notification>> {
    let event = Event::find(db_pool, params.event_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("event {} not found", params.event_id)))?;

    let deadline = event
        .deadline
        .ok_or_else(|| AppError::Validation(format!("event {} has no deadline", event.id)))?;

    // Preserve request order but drop duplicates
    let mut recipients: Vec<i64> = Vec::with_capacity(params.recipients.len());
    for &id in &params.recipients {
        if !recipients.contains(&id) {
            recipients.push(id);
        }
    }
    if recipients.is_empty() {
        return Err(AppError::Validation("event recipient list is empty".to_string()));
    }

    // Membership is validated for the whole batch before anything persists
    for &recipient_id in &recipients {
        if !entity::is_project_member(db_pool, event.project_id, recipient_id).await? {
            return Err(AppError::Validation(format!(
                "recipient {recipient_id} is not a member of project {}",
                event.project_id
            )));
        }
    }

    let instant = resolve_instant(
        deadline,
        params.offset_days,
        &params.time_of_day,
        params.override_at,
        params.force,
    )?;

    let mut created: Vec<Notification> = Vec::with_capacity(recipients.len());
    for &recipient_id in &recipients {
        let record = pending_record(
            TargetKind::Event,
            event.id,
            recipient_id,
            event.project_id,
            params.offset_days,
            &params.time_of_day,
            instant,
            params.created_by,
        );

        match create_and_enqueue(db_pool, dispatch, record, instant, TargetKind::Event).await {
            Ok(notification) => created.push(notification),
            Err(e) => {
                rollback_batch(db_pool, dispatch, &created).await;
                return Err(batch_failure(recipient_id, &e));
            }
        }
    }

    info!(
        "Scheduled event {} reminders for {} recipients at {}",
        event.id,
        created.len(),
        instant
    );
    Ok(created)
}
