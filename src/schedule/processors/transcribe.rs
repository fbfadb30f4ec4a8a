use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::DispatchConfig;
use crate::schedule::callback::{HttpWebhookNotifier, WebhookNotifier};
use crate::schedule::compute::{ComputeClient, HttpComputeClient};
use crate::schedule::error::DispatchError;
use crate::schedule::types::{
    ComputePayload, InputSource, JobOutcome, JobRequest, TaskDefinition, WebhookNotification,
    TRANSCRIBE_TASK,
};
use super::TaskProcessor;

/// Validates a transcription job, forwards it to the compute endpoint and
/// reports progress to the job's webhook.
///
/// Holds no mutable state; clones share the underlying clients.
#[derive(Clone)]
pub struct TranscriptionDispatchHandler {
    compute: Arc<dyn ComputeClient>,
    notifier: Arc<dyn WebhookNotifier>,
}

impl TranscriptionDispatchHandler {
    pub fn new(compute: Arc<dyn ComputeClient>, notifier: Arc<dyn WebhookNotifier>) -> Self {
        Self { compute, notifier }
    }

    /// Builds the HTTP-backed handler. Both clients share one connection pool.
    pub fn from_config(config: &DispatchConfig) -> Self {
        let client = reqwest::Client::new();
        Self::new(
            Arc::new(HttpComputeClient::from_config(client.clone(), config)),
            Arc::new(HttpWebhookNotifier::new(client)),
        )
    }

    /// Runs one dispatch.
    ///
    /// On failure the webhook (when there is one) gets a single `failed`
    /// notification and the original error is returned to the runner.
    pub async fn dispatch(&self, request: JobRequest) -> Result<JobOutcome, DispatchError> {
        info!(
            job_id = request.job_id().unwrap_or_default(),
            language = request.language.as_deref().unwrap_or_default(),
            has_file_path = request.file_path.is_some(),
            has_file_url = request.file_url.is_some(),
            "Starting transcription dispatch"
        );

        match self.try_dispatch(&request).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(
                    job_id = request.job_id().unwrap_or_default(),
                    kind = e.kind(),
                    "Transcription dispatch failed: {}", e
                );
                self.report_failure(&request, &e).await;
                Err(e)
            }
        }
    }

    async fn try_dispatch(&self, request: &JobRequest) -> Result<JobOutcome, DispatchError> {
        let job = request.validate()?;
        if let InputSource::Both { .. } = job.source {
            warn!(job_id = %job.job_id, "Both file_path and file_url given, forwarding both");
        }

        self.notify(&job.webhook_url, &WebhookNotification::processing(&job.job_id))
            .await;

        let payload = ComputePayload::from(&job);
        let detail = self.compute.submit(&payload).await?;

        info!(job_id = %job.job_id, "Compute endpoint accepted job: {}", detail);
        Ok(JobOutcome::dispatched(job.job_id, detail))
    }

    async fn report_failure(&self, request: &JobRequest, error: &DispatchError) {
        let Some(webhook_url) = request.webhook_url() else {
            warn!(
                job_id = request.job_id().unwrap_or_default(),
                "No webhook_url, failure is only visible to the task runner"
            );
            return;
        };

        let notification = WebhookNotification::failed(request.job_id().unwrap_or_default(), error);
        self.notify(webhook_url, &notification).await;
    }

    // fire and forget
    async fn notify(&self, url: &str, notification: &WebhookNotification) {
        match self.notifier.notify(url, notification).await {
            Ok(status) => debug!(
                job_id = %notification.job_id,
                status = %notification.status,
                "Webhook acknowledged with {}", status
            ),
            Err(e) => warn!(
                job_id = %notification.job_id,
                status = %notification.status,
                "Failed to notify webhook: {}", e
            ),
        }
    }
}

#[async_trait]
impl TaskProcessor for TranscriptionDispatchHandler {
    fn definition(&self) -> &TaskDefinition {
        &TRANSCRIBE_TASK
    }

    async fn run(&self, payload: Value) -> Result<JobOutcome, DispatchError> {
        let request = match JobRequest::deserialize(&payload) {
            Ok(request) => request,
            Err(e) => {
                let e = DispatchError::Validation(format!("malformed job request: {}", e));
                // keep whatever is usable so the webhook still hears about it
                let partial = JobRequest {
                    job_id: string_field(&payload, "job_id"),
                    webhook_url: string_field(&payload, "webhook_url"),
                    ..Default::default()
                };
                error!(
                    job_id = partial.job_id().unwrap_or_default(),
                    kind = e.kind(),
                    "Rejected job payload: {}", e
                );
                self.report_failure(&partial, &e).await;
                return Err(e);
            }
        };
        self.dispatch(request).await
    }
}

fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}
