//! Application state shared across handlers

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::services::dispatch::DispatchClient;
use crate::services::mailer::Mailer;

/// Shared application state accessible via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub dispatch: Arc<DispatchClient>,
    pub mailer: Arc<Mailer>,
}

impl AppState {
    #[must_use]
    pub fn new(db_pool: SqlitePool, dispatch: DispatchClient, mailer: Mailer) -> Self {
        Self {
            db_pool,
            dispatch: Arc::new(dispatch),
            mailer: Arc::new(mailer),
        }
    }
}
