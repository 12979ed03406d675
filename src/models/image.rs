use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Processing state of a single image pipeline.
///
/// `Processing` is the only non-terminal state. `Complete` and `Failed`
/// are terminal; an image transitions out of `Processing` at most once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ImageStatus {
    Processing,
    Complete,
    Failed,
}

/// One image URL to fetch and recompress, owned by a product.
///
/// Invariant: `output_url` is `Some` if and only if `status` is
/// [`ImageStatus::Complete`].
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    pub id: Uuid,
    pub product_id: Uuid,
    pub input_url: String,
    pub output_url: Option<String>,
    pub status: ImageStatus,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

impl Image {
    pub fn is_terminal(&self) -> bool {
        self.status != ImageStatus::Processing
    }
}
