use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response after a CSV upload has been durably ingested.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub request_id: Uuid,
}

/// Response for batch status polling. Also returned by the export
/// endpoint as a processing indicator while a batch is incomplete.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub request_id: Uuid,
    pub status: String,
    pub progress: String,
}

/// Optional query parameters accepted by `POST /upload`.
#[derive(Debug, Deserialize, Default)]
pub struct UploadParams {
    pub webhook_url: Option<String>,
}

/// Payload POSTed to a batch's webhook on completion.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub request_id: Uuid,
    pub status: String,
}
