//! Delivery executor invoked by the inbound dispatch callback
//!
//! The facility delivers at least once, so this path is written to be
//! invoked repeatedly: a non-pending record returns without side
//! effects, and the final transition is a conditional update. Failures
//! are recorded on the record instead of propagating, otherwise the
//! facility would retry indefinitely.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::entity::{Event, Subtask, User};
use crate::models::notification::{Notification, NotificationStatus, TargetKind};
use crate::services::mailer::Mailer;
use crate::services::render;

/// What a delivery attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Email sent and record transitioned to `Sent`
    Sent,
    /// Record was already in a terminal state; nothing happened
    AlreadyTerminal,
    /// Target entity or recipient no longer exists; record marked `Failed`
    TargetGone,
    /// Email transport failed; record marked `Failed`
    TransportFailed,
}

struct ResolvedTarget {
    kind_label: &'static str,
    title: String,
    description: Option<String>,
    deadline: Option<DateTime<Utc>>,
}

async fn resolve_target(
    db_pool: &SqlitePool,
    kind: TargetKind,
    entity_id: i64,
) -> Result<Option<ResolvedTarget>, sqlx::Error> {
    match kind {
        TargetKind::Subtask => Ok(Subtask::find(db_pool, entity_id).await?.map(|s| {
            ResolvedTarget {
                kind_label: "sub-task",
                title: s.title,
                description: s.description,
                deadline: s.deadline,
            }
        })),
        TargetKind::Event => Ok(Event::find(db_pool, entity_id).await?.map(|e| {
            ResolvedTarget {
                kind_label: "event",
                title: e.title,
                description: e.description,
                deadline: e.deadline,
            }
        })),
    }
}

async fn fail_record(db_pool: &SqlitePool, id: i64, reason: &str) -> AppResult<()> {
    warn!("Notification {id} failed: {reason}");
    Notification::mark_failed(db_pool, id, reason).await?;
    Ok(())
}

/// Executes one delivery callback.
///
/// Entity, recipient and message content are re-resolved from current
/// data rather than taken from the enqueue-time payload, so edits made
/// after scheduling are reflected in the delivered email.
pub async fn deliver(
    db_pool: &SqlitePool,
    mailer: &Mailer,
    notification_id: i64,
) -> AppResult<DeliveryOutcome> {
    let record = Notification::find(db_pool, notification_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("notification {notification_id} not found"))
        })?;

    if record.state() != Some(NotificationStatus::Pending) {
        debug!(
            "Notification {notification_id} is already {}, skipping",
            record.state().map_or("unknown", NotificationStatus::as_str)
        );
        return Ok(DeliveryOutcome::AlreadyTerminal);
    }

    let Some(kind) = record.target_kind() else {
        fail_record(db_pool, notification_id, "unrecognized target kind").await?;
        return Ok(DeliveryOutcome::TargetGone);
    };

    let Some(target) = resolve_target(db_pool, kind, record.entity_id).await? else {
        fail_record(
            db_pool,
            notification_id,
            &format!("{} {} no longer exists", kind.as_str(), record.entity_id),
        )
        .await?;
        return Ok(DeliveryOutcome::TargetGone);
    };

    let Some(recipient) = User::find(db_pool, record.recipient_id).await? else {
        fail_record(
            db_pool,
            notification_id,
            &format!("recipient {} no longer exists", record.recipient_id),
        )
        .await?;
        return Ok(DeliveryOutcome::TargetGone);
    };

    let rendered = render::render_reminder(
        target.kind_label,
        &recipient.name,
        &target.title,
        target.description.as_deref(),
        target.deadline,
        record.offset_days,
    );

    let to = vec![recipient.email];
    match mailer.send(&to, &rendered.subject, &rendered.html).await {
        Ok(delivery_ref) => {
            let claimed = Notification::mark_sent(db_pool, notification_id, &delivery_ref).await?;
            if claimed {
                info!("Notification {notification_id} sent: {delivery_ref}");
                Ok(DeliveryOutcome::Sent)
            } else {
                // A concurrent callback finished first
                debug!("Notification {notification_id} lost the send race");
                Ok(DeliveryOutcome::AlreadyTerminal)
            }
        }
        Err(e) => {
            fail_record(db_pool, notification_id, &e.to_string()).await?;
            Ok(DeliveryOutcome::TransportFailed)
        }
    }
}
