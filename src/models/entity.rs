//! Read-only lookups over entity tables owned by the project system
//!
//! The engine reads deadlines, assignees, membership and display fields
//! and never mutates these tables. A notification may outlive its target
//! entity, so every lookup returns `Option`.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Deadline-bound sub-task with a single assignee
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Subtask {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub assignee_id: Option<i64>,
}

/// Deadline-bound event; recipients are supplied per scheduling request
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
}

impl Subtask {
    pub async fn find(db_pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, project_id, title, description, deadline, assignee_id
             FROM subtasks WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(db_pool)
        .await
    }
}

impl Event {
    pub async fn find(db_pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, project_id, title, description, deadline FROM events WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(db_pool)
        .await
    }
}

impl User {
    pub async fn find(db_pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT id, email, name FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(db_pool)
            .await
    }
}

/// Returns whether a user belongs to a project.
pub async fn is_project_member(
    db_pool: &SqlitePool,
    project_id: i64,
    user_id: i64,
) -> Result<bool, sqlx::Error> {
    let row: (i32,) = sqlx::query_as(
        "SELECT COUNT(*) FROM project_members WHERE project_id = ? AND user_id = ?",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_one(db_pool)
    .await?;

    Ok(row.0 > 0)
}
