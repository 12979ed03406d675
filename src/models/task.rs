use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// One upload batch: a CSV file expanded into products and images.
///
/// `total_images` only grows during ingestion; `processed_images` is
/// incremented exactly once per image that reaches `Complete`. The batch
/// is complete when the two are equal.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub request_id: Uuid,
    pub total_images: i64,
    pub processed_images: i64,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn is_complete(&self) -> bool {
        self.processed_images == self.total_images
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_complete() {
            "complete"
        } else {
            "processing"
        }
    }

    /// Progress as "processed/total", e.g. "2/3".
    pub fn progress(&self) -> String {
        format!("{}/{}", self.processed_images, self.total_images)
    }
}
