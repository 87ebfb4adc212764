//! Notification record model and database operations

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

/// Notification lifecycle state
///
/// `Sent`, `Failed` and `Cancelled` are terminal: a record never
/// transitions out of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum NotificationStatus {
    Pending = 0,
    Sent = 1,
    Failed = 2,
    Cancelled = 3,
}

impl NotificationStatus {
    #[must_use]
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Pending),
            1 => Some(Self::Sent),
            2 => Some(Self::Failed),
            3 => Some(Self::Cancelled),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Which entity table a notification targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    Subtask,
    Event,
}

impl TargetKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subtask => "subtask",
            Self::Event => "event",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "subtask" => Some(Self::Subtask),
            "event" => Some(Self::Event),
            _ => None,
        }
    }
}

/// Notification record entity
///
/// Multi-recipient events are fanned out into one row per recipient at
/// creation time, so every row carries exactly one `recipient_id` and
/// each recipient's lifecycle is independent.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Option<i64>,
    pub kind: String,
    pub entity_id: i64,
    pub recipient_id: i64,
    pub project_id: i64,
    pub offset_days: i64,
    pub time_of_day: String,
    pub scheduled_for: DateTime<Utc>,
    pub status: i32,
    pub external_handle: Option<String>,
    pub delivery_ref: Option<String>,
    pub error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_by: i64,
}

const COLUMNS: &str = "id, kind, entity_id, recipient_id, project_id, offset_days, time_of_day, \
                       scheduled_for, status, external_handle, delivery_ref, error, sent_at, created_by";

impl Notification {
    #[must_use]
    pub fn target_kind(&self) -> Option<TargetKind> {
        TargetKind::parse(&self.kind)
    }

    #[must_use]
    pub fn state(&self) -> Option<NotificationStatus> {
        NotificationStatus::from_i32(self.status)
    }

    /// Inserts the record in `Pending` state and returns it with its ID.
    ///
    /// The row must exist before any external enqueue call is attempted so
    /// the later delivery callback can resolve it; `external_handle` is
    /// stored separately once the enqueue succeeds.
    pub async fn insert(self, db_pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO notifications
                 (kind, entity_id, recipient_id, project_id, offset_days, time_of_day,
                  scheduled_for, status, created_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now'), datetime('now'))
             RETURNING id",
        )
        .bind(&self.kind)
        .bind(self.entity_id)
        .bind(self.recipient_id)
        .bind(self.project_id)
        .bind(self.offset_days)
        .bind(&self.time_of_day)
        .bind(self.scheduled_for)
        .bind(self.status)
        .bind(self.created_by)
        .fetch_one(db_pool)
        .await?;

        Ok(Self {
            id: Some(row.0),
            ..self
        })
    }

    /// Loads a record by ID.
    pub async fn find(db_pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM notifications WHERE id = ?");
        sqlx::query_as(&sql).bind(id).fetch_optional(db_pool).await
    }

    /// Deletes a record. Used only by batch-creation rollback.
    pub async fn delete(db_pool: &SqlitePool, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(id)
            .execute(db_pool)
            .await?;
        Ok(())
    }

    /// Stores the external handle after a successful enqueue.
    pub async fn store_handle(
        db_pool: &SqlitePool,
        id: i64,
        handle: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE notifications SET external_handle=?, updated_at=datetime('now') WHERE id=?",
        )
        .bind(handle)
        .bind(id)
        .execute(db_pool)
        .await?;
        Ok(())
    }

    /// Transitions the record to `Sent`.
    ///
    /// A single conditional update closes the race between two
    /// near-simultaneous delivery callbacks: only the caller that actually
    /// flipped the row gets `true`.
    pub async fn mark_sent(
        db_pool: &SqlitePool,
        id: i64,
        delivery_ref: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications
             SET status=?, delivery_ref=?, sent_at=?, updated_at=datetime('now')
             WHERE id=? AND status=?",
        )
        .bind(NotificationStatus::Sent as i32)
        .bind(delivery_ref)
        .bind(Utc::now())
        .bind(id)
        .bind(NotificationStatus::Pending as i32)
        .execute(db_pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Transitions the record to `Failed` with a reason.
    pub async fn mark_failed(
        db_pool: &SqlitePool,
        id: i64,
        reason: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications
             SET status=?, error=?, updated_at=datetime('now')
             WHERE id=? AND status=?",
        )
        .bind(NotificationStatus::Failed as i32)
        .bind(reason)
        .bind(id)
        .bind(NotificationStatus::Pending as i32)
        .execute(db_pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Transitions the record to `Cancelled`.
    pub async fn mark_cancelled(db_pool: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications SET status=?, updated_at=datetime('now') WHERE id=? AND status=?",
        )
        .bind(NotificationStatus::Cancelled as i32)
        .bind(id)
        .bind(NotificationStatus::Pending as i32)
        .execute(db_pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Replaces the schedule of a still-pending record.
    ///
    /// `handle` is whichever external handle is now authoritative after the
    /// dispatch facility reschedule.
    pub async fn update_schedule(
        db_pool: &SqlitePool,
        id: i64,
        scheduled_for: DateTime<Utc>,
        offset_days: i64,
        time_of_day: &str,
        handle: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notifications
             SET scheduled_for=?, offset_days=?, time_of_day=?, external_handle=?,
                 updated_at=datetime('now')
             WHERE id=? AND status=?",
        )
        .bind(scheduled_for)
        .bind(offset_days)
        .bind(time_of_day)
        .bind(handle)
        .bind(id)
        .bind(NotificationStatus::Pending as i32)
        .execute(db_pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
