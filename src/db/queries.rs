use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use uuid::Uuid;

use crate::models::image::{Image, ImageStatus};
use crate::models::product::Product;
use crate::models::task::Task;

/// Insert a new task (batch) with zero images. Counters start at 0 and
/// only grow during ingestion.
pub async fn create_task(
    executor: impl SqliteExecutor<'_>,
    request_id: Uuid,
    webhook_url: Option<&str>,
) -> Result<Task, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        r#"
        INSERT INTO tasks (id, request_id, total_images, processed_images, webhook_url, created_at)
        VALUES (?1, ?2, 0, 0, ?3, ?4)
        RETURNING id, request_id, total_images, processed_images, webhook_url, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(request_id)
    .bind(webhook_url)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
}

/// Look up a task by its external request id.
pub async fn get_task_by_request_id(
    executor: impl SqliteExecutor<'_>,
    request_id: Uuid,
) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        r#"
        SELECT id, request_id, total_images, processed_images, webhook_url, created_at
        FROM tasks
        WHERE request_id = ?1
        "#,
    )
    .bind(request_id)
    .fetch_optional(executor)
    .await
}

/// Insert one product (CSV row) belonging to a task.
pub async fn create_product(
    executor: impl SqliteExecutor<'_>,
    request_id: Uuid,
    serial_num: i64,
    product_name: &str,
    position: i64,
) -> Result<Product, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products (id, request_id, serial_num, product_name, position, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        RETURNING id, request_id, serial_num, product_name, position, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(request_id)
    .bind(serial_num)
    .bind(product_name)
    .bind(position)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
}

/// Insert one image in the `processing` state.
pub async fn create_image(
    executor: impl SqliteExecutor<'_>,
    product_id: Uuid,
    input_url: &str,
    position: i64,
) -> Result<Image, sqlx::Error> {
    sqlx::query_as::<_, Image>(
        r#"
        INSERT INTO images (id, product_id, input_url, output_url, status, position, created_at)
        VALUES (?1, ?2, ?3, NULL, ?4, ?5, ?6)
        RETURNING id, product_id, input_url, output_url, status, position, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(product_id)
    .bind(input_url)
    .bind(ImageStatus::Processing)
    .bind(position)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
}

/// Grow a task's `total_images` during ingestion.
pub async fn add_total_images(
    executor: impl SqliteExecutor<'_>,
    request_id: Uuid,
    count: i64,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE tasks
        SET total_images = total_images + ?1
        WHERE request_id = ?2
        "#,
    )
    .bind(count)
    .bind(request_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }

    Ok(())
}

/// Get an image by ID
pub async fn get_image(
    executor: impl SqliteExecutor<'_>,
    image_id: Uuid,
) -> Result<Option<Image>, sqlx::Error> {
    sqlx::query_as::<_, Image>(
        r#"
        SELECT id, product_id, input_url, output_url, status, position, created_at
        FROM images
        WHERE id = ?1
        "#,
    )
    .bind(image_id)
    .fetch_optional(executor)
    .await
}

/// Atomically increment `processed_images` and return the post-increment
/// row. A single UPDATE..RETURNING statement, so concurrent callers for
/// the same task never lose an update or read a stale count.
pub async fn increment_processed(
    executor: impl SqliteExecutor<'_>,
    request_id: Uuid,
) -> Result<Task, sqlx::Error> {
    sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks
        SET processed_images = processed_images + 1
        WHERE request_id = ?1
        RETURNING id, request_id, total_images, processed_images, webhook_url, created_at
        "#,
    )
    .bind(request_id)
    .fetch_one(executor)
    .await
}

/// Set an image's output URL and `complete` status in one statement.
pub async fn set_image_complete(
    executor: impl SqliteExecutor<'_>,
    image_id: Uuid,
    output_url: &str,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE images
        SET output_url = ?1, status = ?2
        WHERE id = ?3
        "#,
    )
    .bind(output_url)
    .bind(ImageStatus::Complete)
    .bind(image_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }

    Ok(())
}

/// Mark an image terminally failed. Failed images are observable in
/// storage but never counted toward `processed_images`, so a batch with
/// a permanent failure never reports complete.
pub async fn set_image_failed(
    executor: impl SqliteExecutor<'_>,
    image_id: Uuid,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE images
        SET status = ?1
        WHERE id = ?2
        "#,
    )
    .bind(ImageStatus::Failed)
    .bind(image_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }

    Ok(())
}

/// Terminal transition for one image: mark it complete and increment the
/// owning task's counter in a single transaction, returning the
/// post-increment task row. The completion check that decides whether to
/// fire the webhook must use this returned row, not a separate re-query.
pub async fn complete_image(
    pool: &SqlitePool,
    image_id: Uuid,
    output_url: &str,
    request_id: Uuid,
) -> Result<Task, sqlx::Error> {
    let mut tx = pool.begin().await?;

    set_image_complete(&mut *tx, image_id, output_url).await?;
    let task = increment_processed(&mut *tx, request_id).await?;

    tx.commit().await?;

    Ok(task)
}

/// All images of a batch, joined through products, in creation order.
pub async fn list_images_for_request(
    executor: impl SqliteExecutor<'_>,
    request_id: Uuid,
) -> Result<Vec<Image>, sqlx::Error> {
    sqlx::query_as::<_, Image>(
        r#"
        SELECT i.id, i.product_id, i.input_url, i.output_url, i.status, i.position, i.created_at
        FROM images i
        JOIN products p ON i.product_id = p.id
        WHERE p.request_id = ?1
        ORDER BY p.position ASC, i.position ASC
        "#,
    )
    .bind(request_id)
    .fetch_all(executor)
    .await
}

/// Products of a batch in CSV row order.
pub async fn list_products_for_request(
    executor: impl SqliteExecutor<'_>,
    request_id: Uuid,
) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>(
        r#"
        SELECT id, request_id, serial_num, product_name, position, created_at
        FROM products
        WHERE request_id = ?1
        ORDER BY position ASC
        "#,
    )
    .bind(request_id)
    .fetch_all(executor)
    .await
}

/// Images of one product in creation order.
pub async fn list_images_for_product(
    executor: impl SqliteExecutor<'_>,
    product_id: Uuid,
) -> Result<Vec<Image>, sqlx::Error> {
    sqlx::query_as::<_, Image>(
        r#"
        SELECT id, product_id, input_url, output_url, status, position, created_at
        FROM images
        WHERE product_id = ?1
        ORDER BY position ASC
        "#,
    )
    .bind(product_id)
    .fetch_all(executor)
    .await
}

/// Total number of tasks (test support).
pub async fn count_tasks(executor: impl SqliteExecutor<'_>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tasks")
        .fetch_one(executor)
        .await
}

/// Delete a task and everything it owns. The cascade is an explicit
/// multi-statement transaction (children first), not implicit
/// object-graph behavior. Never invoked by the core pipeline.
pub async fn delete_task(pool: &SqlitePool, request_id: Uuid) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        DELETE FROM images
        WHERE product_id IN (SELECT id FROM products WHERE request_id = ?1)
        "#,
    )
    .bind(request_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM products WHERE request_id = ?1")
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM tasks WHERE request_id = ?1")
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }

    tx.commit().await?;

    Ok(())
}
