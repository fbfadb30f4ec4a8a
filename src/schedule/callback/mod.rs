use async_trait::async_trait;
use tracing::debug;

use crate::schedule::error::WebhookNotifyError;
use crate::schedule::types::WebhookNotification;

/// Delivers job status updates to a caller-supplied webhook.
///
/// A notification is attempted exactly once. The returned result only tells
/// the caller what happened so it can be logged; it must never decide the
/// outcome of the job.
#[async_trait]
pub trait WebhookNotifier: Send + Sync {
    async fn notify(
        &self,
        url: &str,
        notification: &WebhookNotification,
    ) -> Result<u16, WebhookNotifyError>;
}

// HTTP webhook implementation
#[derive(Clone, Default)]
pub struct HttpWebhookNotifier {
    client: reqwest::Client,
}

impl HttpWebhookNotifier {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WebhookNotifier for HttpWebhookNotifier {
    async fn notify(
        &self,
        url: &str,
        notification: &WebhookNotification,
    ) -> Result<u16, WebhookNotifyError> {
        debug!(
            job_id = %notification.job_id,
            status = %notification.status,
            "Posting webhook notification to {}", url
        );

        let response = self
            .client
            .post(url)
            .json(notification)
            .send()
            .await
            .map_err(|e| WebhookNotifyError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebhookNotifyError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(status.as_u16())
    }
}
