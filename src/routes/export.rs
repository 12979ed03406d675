use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::queries;
use crate::error::{AppError, AppResult};
use crate::models::api::StatusResponse;
use crate::services::csv::{self, ExportRow};

/// GET /export-csv/{request_id} — Download the processed batch as CSV.
///
/// Refuses with a JSON processing indicator (not a file) while any image
/// is unprocessed. Rows come back in CSV upload order, URL lists in
/// per-image creation order.
pub async fn export_csv(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
) -> AppResult<Response> {
    let task = queries::get_task_by_request_id(&state.db, request_id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            entity: "Task",
            id: request_id.to_string(),
        })?;

    if !task.is_complete() {
        return Ok(Json(StatusResponse {
            request_id,
            status: "processing".to_string(),
            progress: task.progress(),
        })
        .into_response());
    }

    let products = queries::list_products_for_request(&state.db, request_id).await?;

    let mut rows = Vec::with_capacity(products.len());
    for product in products {
        let images = queries::list_images_for_product(&state.db, product.id).await?;
        rows.push(ExportRow {
            serial_num: product.serial_num,
            product_name: product.product_name,
            input_urls: images.iter().map(|i| i.input_url.clone()).collect(),
            output_urls: images.iter().filter_map(|i| i.output_url.clone()).collect(),
        });
    }

    let body = csv::write_export(&rows);

    let headers = [
        (header::CONTENT_TYPE, "text/csv"),
        (header::CONTENT_DISPOSITION, "attachment; filename=\"data.csv\""),
    ];

    Ok((headers, body).into_response())
}
