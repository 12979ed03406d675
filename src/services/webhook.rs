use std::time::Duration;

use axum::http::StatusCode;
use uuid::Uuid;

use crate::models::api::WebhookPayload;

/// Best-effort, at-most-once completion callback.
///
/// Fired only by the image job that observes the final counter
/// increment. Expects exactly HTTP 200; anything else is logged and
/// dropped, never retried.
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub async fn notify_completed(&self, webhook_url: &str, request_id: Uuid) {
        let payload = WebhookPayload {
            request_id,
            status: "completed".to_string(),
        };

        match self.client.post(webhook_url).json(&payload).send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                tracing::info!(%request_id, webhook_url, "Completion webhook delivered");
                metrics::counter!("webhook_deliveries_total").increment(1);
            }
            Ok(response) => {
                tracing::error!(
                    %request_id,
                    webhook_url,
                    status = %response.status(),
                    "Completion webhook rejected"
                );
                metrics::counter!("webhook_failures_total").increment(1);
            }
            Err(e) => {
                tracing::error!(
                    %request_id,
                    webhook_url,
                    error = %e,
                    "Completion webhook delivery failed"
                );
                metrics::counter!("webhook_failures_total").increment(1);
            }
        }
    }
}
