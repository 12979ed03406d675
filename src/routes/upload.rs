use axum::extract::{Multipart, Query, State};
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::api::{UploadParams, UploadResponse};
use crate::services::{csv, ingest};

/// POST /upload — Ingest a product CSV and start background processing.
///
/// Synchronous up to the point where every task/product/image row is
/// durable; only then is the request_id handed back and the batch
/// dispatched to the worker pool.
pub async fn upload_csv(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let mut csv_bytes: Option<axum::body::Bytes> = None;
    let mut form_webhook: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                match field.content_type() {
                    Some("text/csv") | Some("application/vnd.ms-excel") => {}
                    _ => {
                        return Err(AppError::Validation(
                            "Uploaded file is not a CSV".to_string(),
                        ))
                    }
                }

                if !field
                    .file_name()
                    .is_some_and(|name| name.ends_with(".csv"))
                {
                    return Err(AppError::Validation(
                        "File does not have a .csv extension".to_string(),
                    ));
                }

                csv_bytes = Some(field.bytes().await?);
            }
            Some("webhook_url") => {
                form_webhook = Some(field.text().await?);
            }
            _ => {}
        }
    }

    let data = csv_bytes
        .ok_or_else(|| AppError::Validation("Missing multipart field 'file'".to_string()))?;
    let text = std::str::from_utf8(&data)
        .map_err(|_| AppError::Validation("CSV is not valid UTF-8".to_string()))?;

    let rows = csv::parse_products_csv(text)?;

    // Form field wins over the query parameter when both are present.
    let webhook_url = form_webhook.or(params.webhook_url);
    if let Some(url) = &webhook_url {
        reqwest::Url::parse(url)
            .map_err(|_| AppError::Validation(format!("Invalid webhook_url: {url}")))?;
    }

    let request_id = Uuid::new_v4();
    let task = ingest::ingest_batch(&state.db, request_id, webhook_url.as_deref(), &rows).await?;
    metrics::counter!("batches_ingested_total").increment(1);

    tracing::info!(
        %request_id,
        total_images = task.total_images,
        webhook = webhook_url.is_some(),
        "Upload accepted"
    );

    state.dispatcher.dispatch(request_id);

    Ok(Json(UploadResponse { request_id }))
}
