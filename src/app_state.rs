use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::dispatch::JobDispatcher;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub dispatcher: Arc<JobDispatcher>,
}

impl AppState {
    pub fn new(db: SqlitePool, dispatcher: JobDispatcher) -> Self {
        Self {
            db,
            dispatcher: Arc::new(dispatcher),
        }
    }
}
