use axum::routing::{get, post};
use axum::Router;

use crate::app_state::AppState;

pub mod export;
pub mod health;
pub mod metrics;
pub mod status;
pub mod upload;

/// Application routes (everything except the Prometheus scrape endpoint,
/// which carries its own state and is attached in `main`).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/upload", post(upload::upload_csv))
        .route("/status/{request_id}", get(status::get_status))
        .route("/export-csv/{request_id}", get(export::export_csv))
        .route("/health", get(health::health_check))
        .with_state(state)
}
