//! Test modules and shared helpers


#[cfg(test)]
pub mod helpers {
    use chrono::{DateTime, Utc};
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

    pub async fn setup_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind VARCHAR(16) NOT NULL,
                entity_id INTEGER NOT NULL,
                recipient_id INTEGER NOT NULL,
                project_id INTEGER NOT NULL,
                offset_days INTEGER NOT NULL DEFAULT 0,
                time_of_day VARCHAR(5) NOT NULL,
                scheduled_for DATETIME NOT NULL,
                status TINYINT NOT NULL DEFAULT 0,
                external_handle VARCHAR(255),
                delivery_ref VARCHAR(255),
                error VARCHAR(255),
                sent_at DATETIME,
                created_by INTEGER NOT NULL,
                created_at DATETIME NOT NULL DEFAULT (datetime('now')),
                updated_at DATETIME NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email VARCHAR(255) NOT NULL,
                name VARCHAR(255) NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "CREATE TABLE project_members (
                project_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                PRIMARY KEY (project_id, user_id)
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "CREATE TABLE subtasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                title VARCHAR(255) NOT NULL,
                description TEXT,
                deadline DATETIME,
                assignee_id INTEGER
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query(
            "CREATE TABLE events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                title VARCHAR(255) NOT NULL,
                description TEXT,
                deadline DATETIME
            )",
        )
        .execute(&pool)
        .await
        .unwrap();

        sqlx::query("CREATE INDEX idx_notifications_status ON notifications(status)")
            .execute(&pool)
            .await
            .unwrap();

        pool
    }

    pub fn get_api_key() -> String {
        crate::config::APP_CONFIG.api_key.clone()
    }

    pub async fn seed_user(pool: &SqlitePool, email: &str, name: &str) -> i64 {
        let row: (i64,) =
            sqlx::query_as("INSERT INTO users (email, name) VALUES (?, ?) RETURNING id")
                .bind(email)
                .bind(name)
                .fetch_one(pool)
                .await
                .unwrap();
        row.0
    }

    pub async fn seed_member(pool: &SqlitePool, project_id: i64, user_id: i64) {
        sqlx::query("INSERT INTO project_members (project_id, user_id) VALUES (?, ?)")
            .bind(project_id)
            .bind(user_id)
            .execute(pool)
            .await
            .unwrap();
    }

    pub async fn seed_subtask(
        pool: &SqlitePool,
        project_id: i64,
        title: &str,
        deadline: Option<DateTime<Utc>>,
        assignee_id: Option<i64>,
    ) -> i64 {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO subtasks (project_id, title, deadline, assignee_id)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(project_id)
        .bind(title)
        .bind(deadline)
        .bind(assignee_id)
        .fetch_one(pool)
        .await
        .unwrap();
        row.0
    }

    pub async fn seed_event(
        pool: &SqlitePool,
        project_id: i64,
        title: &str,
        deadline: Option<DateTime<Utc>>,
    ) -> i64 {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO events (project_id, title, deadline) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(project_id)
        .bind(title)
        .bind(deadline)
        .fetch_one(pool)
        .await
        .unwrap();
        row.0
    }
}
