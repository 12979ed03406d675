use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::queries;
use crate::models::task::Task;
use crate::services::csv::CsvRow;

/// Expand validated CSV rows into durable Task, Product, and Image rows.
///
/// Everything happens in one transaction: the task row is written first
/// so products can reference its request_id, then one product per row
/// and one `processing` image per URL, accumulating `total_images` as
/// ingestion goes. The caller only learns the request_id after commit,
/// so a returned id always refers to durable data. Any failure rolls the
/// whole batch back.
pub async fn ingest_batch(
    pool: &SqlitePool,
    request_id: Uuid,
    webhook_url: Option<&str>,
    rows: &[CsvRow],
) -> Result<Task, sqlx::Error> {
    let mut tx = pool.begin().await?;

    queries::create_task(&mut *tx, request_id, webhook_url).await?;

    for (row_idx, row) in rows.iter().enumerate() {
        let product = queries::create_product(
            &mut *tx,
            request_id,
            row.serial_num,
            &row.product_name,
            row_idx as i64,
        )
        .await?;

        for (url_idx, url) in row.input_urls.iter().enumerate() {
            queries::create_image(&mut *tx, product.id, url, url_idx as i64).await?;
        }

        if !row.input_urls.is_empty() {
            queries::add_total_images(&mut *tx, request_id, row.input_urls.len() as i64).await?;
        }
    }

    let task = queries::get_task_by_request_id(&mut *tx, request_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;

    tx.commit().await?;

    tracing::info!(
        %request_id,
        products = rows.len(),
        total_images = task.total_images,
        "Batch ingested"
    );

    Ok(task)
}
