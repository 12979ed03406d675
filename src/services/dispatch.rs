use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::db::queries;
use crate::services::processor::ImageProcessor;

/// In-process job dispatcher: one bounded tokio task per image.
///
/// `dispatch` is the entry point used by the upload handler; the spawned
/// supervisor keeps job lifecycle observable by joining every image task
/// and logging panics, rather than detaching work unobserved. Images
/// within a batch run concurrently with no ordering guarantees; the
/// semaphore bounds in-flight work across all batches.
pub struct JobDispatcher {
    pool: SqlitePool,
    processor: Arc<ImageProcessor>,
    semaphore: Arc<Semaphore>,
}

impl JobDispatcher {
    pub fn new(pool: SqlitePool, processor: ImageProcessor, worker_concurrency: usize) -> Self {
        Self {
            pool,
            processor: Arc::new(processor),
            semaphore: Arc::new(Semaphore::new(worker_concurrency.max(1))),
        }
    }

    /// Kick off background processing for a batch. Returns immediately;
    /// the batch outlives the triggering request.
    pub fn dispatch(&self, request_id: Uuid) {
        let pool = self.pool.clone();
        let processor = Arc::clone(&self.processor);
        let semaphore = Arc::clone(&self.semaphore);
        tokio::spawn(async move {
            if let Err(e) = run_batch(pool, processor, semaphore, request_id).await {
                tracing::error!(%request_id, error = %e, "Batch dispatch failed");
            }
        });
    }

    /// Enumerate a batch's images and drive each to a terminal state.
    /// Awaitable directly so tests can run a batch deterministically.
    pub async fn process_request(&self, request_id: Uuid) -> Result<(), sqlx::Error> {
        run_batch(
            self.pool.clone(),
            Arc::clone(&self.processor),
            Arc::clone(&self.semaphore),
            request_id,
        )
        .await
    }
}

async fn run_batch(
    pool: SqlitePool,
    processor: Arc<ImageProcessor>,
    semaphore: Arc<Semaphore>,
    request_id: Uuid,
) -> Result<(), sqlx::Error> {
    let images = queries::list_images_for_request(&pool, request_id).await?;
    tracing::info!(%request_id, images = images.len(), "Processing batch");

    let mut jobs = JoinSet::new();
    for image in images {
        let processor = Arc::clone(&processor);
        let semaphore = Arc::clone(&semaphore);
        jobs.spawn(async move {
            // A closed semaphore only happens at shutdown; drop the job.
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            processor.process_image(image.id, request_id).await;
        });
    }

    while let Some(joined) = jobs.join_next().await {
        if let Err(e) = joined {
            tracing::error!(%request_id, error = %e, "Image job panicked");
        }
    }

    tracing::info!(%request_id, "Batch processing finished");
    Ok(())
}
