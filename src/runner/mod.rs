//! Client for the external task runner's REST API.
//!
//! This is the submitting side: it enqueues transcription runs, which the
//! runner later delivers to [`crate::schedule::TranscriptionDispatchHandler`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Credential, DispatchConfig};
use crate::schedule::{DispatchError, JobRequest, TRANSCRIBE_TASK_ID};
use crate::utils::http::truncate_text;

const MAX_ERROR_BODY_CHARS: usize = 240;

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("task runner unreachable: {0}")]
    Unreachable(String),

    #[error("task runner returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid task runner response: {0}")]
    Response(String),
}

/// A run accepted by the task runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunHandle {
    pub run_id: String,
    pub job_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub id: String,
    pub status: String,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updated_at")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    id: String,
}

pub struct RunnerClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Credential,
    default_webhook_url: Option<String>,
}

impl RunnerClient {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<Credential>,
        default_webhook_url: Option<String>,
    ) -> Result<Self, RunnerError> {
        let api_key = api_key.ok_or_else(|| {
            DispatchError::Configuration("task runner API key is not configured".to_string())
        })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            default_webhook_url,
        })
    }

    pub fn from_config(config: &DispatchConfig) -> Result<Self, RunnerError> {
        let client = reqwest::Client::builder()
            .timeout(config.runner.timeout)
            .build()
            .map_err(|e| DispatchError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Self::new(
            client,
            config.runner.base_url.as_str(),
            config.runner.api_key.clone(),
            config.default_webhook_url(),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    /// Enqueues a transcription run.
    ///
    /// A missing `job_id` is generated and a missing `webhook_url` falls back
    /// to the configured default before the request is validated.
    pub async fn trigger(&self, mut request: JobRequest) -> Result<RunHandle, RunnerError> {
        if request.job_id().is_none() {
            request.job_id = Some(Uuid::new_v4().to_string());
        }
        if request.webhook_url().is_none() {
            request.webhook_url = self.default_webhook_url.clone();
        }
        let job = request.validate()?;

        let response = self
            .client
            .post(self.url("runs"))
            .bearer_auth(self.api_key.secret())
            .json(&json!({ "task": TRANSCRIBE_TASK_ID, "payload": request }))
            .send()
            .await
            .map_err(|e| RunnerError::Unreachable(e.to_string()))?;

        let created: TriggerResponse = Self::parse(response).await?;
        info!(job_id = %job.job_id, run_id = %created.id, "Transcription run created");

        Ok(RunHandle {
            run_id: created.id,
            job_id: job.job_id,
        })
    }

    pub async fn run_status(&self, run_id: &str) -> Result<RunStatus, RunnerError> {
        let response = self
            .client
            .get(self.url(&format!("runs/{}", run_id)))
            .bearer_auth(self.api_key.secret())
            .send()
            .await
            .map_err(|e| RunnerError::Unreachable(e.to_string()))?;
        Self::parse(response).await
    }

    /// Asks the runner to cancel a run. Any failure is logged and reported as `false`.
    pub async fn cancel(&self, run_id: &str) -> bool {
        let result = self
            .client
            .post(self.url(&format!("runs/{}/cancel", run_id)))
            .bearer_auth(self.api_key.secret())
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(run_id, "Run cancelled");
                true
            }
            Ok(response) => {
                warn!(run_id, "Runner refused to cancel run: {}", response.status());
                false
            }
            Err(e) => {
                warn!(run_id, "Failed to cancel run: {}", e);
                false
            }
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, RunnerError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RunnerError::Rejected {
                status: status.as_u16(),
                body: truncate_text(&body, MAX_ERROR_BODY_CHARS),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| RunnerError::Response(e.to_string()))
    }
}
