//! Cancellation and reschedule of pending notifications
//!
//! Dispatch-facility calls are best effort: the handle may already have
//! fired or expired on the other side, which is an expected race. The
//! record transition itself is the authoritative step and is guarded by
//! a conditional update.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::entity::{Event, Subtask};
use crate::models::notification::{Notification, NotificationStatus, TargetKind};
use crate::services::clock;
use crate::services::dispatch::{DispatchClient, DispatchPayload};

/// Partial reschedule parameters; absent fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct ReschedulePatch {
    pub offset_days: Option<u32>,
    pub time_of_day: Option<String>,
}

fn ensure_pending(record: &Notification) -> AppResult<()> {
    match record.state() {
        Some(NotificationStatus::Pending) => Ok(()),
        Some(state) => Err(AppError::AlreadyTerminal(format!(
            "notification {} is already {}",
            record.id.unwrap_or_default(),
            state.as_str()
        ))),
        None => Err(AppError::Internal(format!(
            "notification {} has an unknown state",
            record.id.unwrap_or_default()
        ))),
    }
}

async fn load(db_pool: &SqlitePool, id: i64) -> AppResult<Notification> {
    Notification::find(db_pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("notification {id} not found")))
}

/// Cancels a pending notification.
pub async fn cancel(db_pool: &SqlitePool, dispatch: &DispatchClient, id: i64) -> AppResult<()> {
    let record = load(db_pool, id).await?;
    ensure_pending(&record)?;

    if let Some(handle) = &record.external_handle {
        dispatch.cancel(handle).await;
    }

    let claimed = Notification::mark_cancelled(db_pool, id).await?;
    if !claimed {
        // Delivered or cancelled between our load and the update
        return Err(AppError::AlreadyTerminal(format!(
            "notification {id} reached a terminal state concurrently"
        )));
    }

    info!("Notification {id} cancelled");
    Ok(())
}

/// Re-derives the target entity's current deadline.
async fn current_deadline(
    db_pool: &SqlitePool,
    record: &Notification,
) -> AppResult<chrono::DateTime<chrono::Utc>> {
    let kind = record.target_kind().ok_or_else(|| {
        AppError::Internal(format!("notification has unrecognized kind {}", record.kind))
    })?;

    let deadline = match kind {
        TargetKind::Subtask => Subtask::find(db_pool, record.entity_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("sub-task {} no longer exists", record.entity_id))
            })?
            .deadline,
        TargetKind::Event => Event::find(db_pool, record.entity_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("event {} no longer exists", record.entity_id))
            })?
            .deadline,
    };

    deadline.ok_or_else(|| {
        AppError::Validation(format!(
            "{} {} no longer has a deadline",
            kind.as_str(),
            record.entity_id
        ))
    })
}

/// Recomputes a pending notification's delivery instant and re-enqueues
/// it with the dispatch facility.
pub async fn reschedule(
    db_pool: &SqlitePool,
    dispatch: &DispatchClient,
    id: i64,
    patch: ReschedulePatch,
) -> AppResult<Notification> {
    let record = load(db_pool, id).await?;
    ensure_pending(&record)?;

    let deadline = current_deadline(db_pool, &record).await?;

    let offset_days = patch
        .offset_days
        .unwrap_or_else(|| u32::try_from(record.offset_days).unwrap_or(0));
    let time_of_day = patch
        .time_of_day
        .unwrap_or_else(|| record.time_of_day.clone());

    let instant = clock::compute_delivery_instant(deadline, offset_days, &time_of_day)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if !clock::can_schedule(deadline, offset_days, &time_of_day) {
        return Err(AppError::PastSchedule(format!(
            "new delivery instant {instant} is not far enough in the future"
        )));
    }

    let payload = DispatchPayload {
        notification_id: id,
        kind: record.kind.clone(),
        entity_id: record.entity_id,
    };
    let dedup = format!(
        "{}:{}:{}:{offset_days}:{}",
        record.kind,
        record.entity_id,
        record.recipient_id,
        instant.timestamp()
    );

    let new_handle = match &record.external_handle {
        Some(handle) => dispatch.reschedule(handle, &payload, instant, &dedup).await?,
        None => dispatch.enqueue(&payload, instant, &dedup).await?,
    };

    let claimed = Notification::update_schedule(
        db_pool,
        id,
        instant,
        i64::from(offset_days),
        &time_of_day,
        &new_handle,
    )
    .await?;

    if !claimed {
        dispatch.cancel(&new_handle).await;
        return Err(AppError::AlreadyTerminal(format!(
            "notification {id} reached a terminal state concurrently"
        )));
    }

    info!("Notification {id} rescheduled for {instant}");
    load(db_pool, id).await
}
