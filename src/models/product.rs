use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// One CSV row of an upload batch. Owns 1..N images, immutable once
/// ingested. `position` is the zero-based row index within the upload,
/// used to keep export ordering deterministic.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub request_id: Uuid,
    pub serial_num: i64,
    pub product_name: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}
