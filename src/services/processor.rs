use std::io::Cursor;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use image::codecs::jpeg::JpegEncoder;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::queries;
use crate::services::webhook::WebhookNotifier;

/// Per-image failure. Caught and logged inside [`ImageProcessor`]; never
/// propagates to the HTTP layer and never aborts sibling images.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("image record not found")]
    MissingRecord,

    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("fetch returned an empty body")]
    EmptyBody,

    #[error("decode/encode failed: {0}")]
    Codec(#[from] image::ImageError),

    #[error("encode worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("failed to persist output: {0}")]
    Persist(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Drives a single image from `processing` to a terminal state:
/// fetch bytes, recompress off the async path, persist the output file,
/// then commit the terminal transition and counter increment together.
pub struct ImageProcessor {
    pool: SqlitePool,
    client: reqwest::Client,
    notifier: WebhookNotifier,
    output_dir: PathBuf,
    jpeg_quality: u8,
}

impl ImageProcessor {
    pub fn new(
        pool: SqlitePool,
        notifier: WebhookNotifier,
        output_dir: impl Into<PathBuf>,
        fetch_timeout: Duration,
        jpeg_quality: u8,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(fetch_timeout)
            .build()?;

        Ok(Self {
            pool,
            client,
            notifier,
            output_dir: output_dir.into(),
            jpeg_quality,
        })
    }

    /// Process one image to a terminal state. Failures are logged and
    /// recorded as a terminal `failed` status; they are not counted
    /// toward the batch's processed counter, so a batch containing a
    /// permanent failure never reports complete.
    pub async fn process_image(&self, image_id: Uuid, request_id: Uuid) {
        let start = Instant::now();

        match self.try_process(image_id, request_id).await {
            Ok(true) => {
                metrics::counter!("images_processed_total").increment(1);
                metrics::histogram!("image_processing_seconds")
                    .record(start.elapsed().as_secs_f64());
            }
            Ok(false) => {
                tracing::debug!(%image_id, "Image already in a terminal state, skipping");
            }
            Err(e) => {
                tracing::error!(%image_id, %request_id, error = %e, "Image processing failed");
                metrics::counter!("images_failed_total").increment(1);

                if let Err(db_err) = queries::set_image_failed(&self.pool, image_id).await {
                    tracing::error!(
                        %image_id,
                        error = %db_err,
                        "Failed to record image failure"
                    );
                }
            }
        }
    }

    /// Returns Ok(true) if the image was driven to `complete`, Ok(false)
    /// if it was already terminal.
    async fn try_process(&self, image_id: Uuid, request_id: Uuid) -> Result<bool, ProcessError> {
        // Re-fetch the current record rather than trusting the snapshot
        // taken at dispatch time; a terminal image is never reprocessed,
        // which keeps the counter increment at-most-once per image.
        let image = queries::get_image(&self.pool, image_id)
            .await?
            .ok_or(ProcessError::MissingRecord)?;
        if image.is_terminal() {
            return Ok(false);
        }

        tracing::debug!(%image_id, url = %image.input_url, "Fetching input image");
        let response = self.client.get(&image.input_url).send().await?;
        let response = response.error_for_status()?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ProcessError::EmptyBody);
        }

        // Decode + re-encode is CPU-bound; run it off the async path so
        // sibling fetches keep progressing.
        let quality = self.jpeg_quality;
        let output =
            tokio::task::spawn_blocking(move || recompress_jpeg(&bytes, quality)).await??;

        let output_path = self.output_dir.join(format!("{image_id}.jpg"));
        tokio::fs::write(&output_path, &output).await?;
        let output_url = output_path.to_string_lossy().into_owned();

        // One transaction: terminal state + counter increment. The
        // completion check below uses the post-increment row returned by
        // that same transaction, so exactly one image in the batch can
        // observe the final equality.
        let task = queries::complete_image(&self.pool, image_id, &output_url, request_id).await?;

        tracing::info!(
            %image_id,
            %request_id,
            progress = %task.progress(),
            output = %output_url,
            "Image recompressed"
        );

        if task.is_complete() {
            if let Some(webhook_url) = &task.webhook_url {
                self.notifier.notify_completed(webhook_url, request_id).await;
            }
        }

        Ok(true)
    }
}

/// Decode any supported input format and re-encode as lossy JPEG at the
/// given quality. Alpha is flattened to RGB first; JPEG has no alpha
/// channel.
fn recompress_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());

    let mut buf = Cursor::new(Vec::new());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
    Ok(buf.into_inner())
}
