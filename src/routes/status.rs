use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::models::api::StatusResponse;

/// GET /status/{request_id} — Poll a batch's completion progress.
pub async fn get_status(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> AppResult<Json<StatusResponse>> {
    let task = queries::get_task_by_request_id(&state.db, request_id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            entity: "Task",
            id: request_id.to_string(),
        })?;

    Ok(Json(StatusResponse {
        request_id,
        status: task.status_label().to_string(),
        progress: task.progress(),
    }))
}
