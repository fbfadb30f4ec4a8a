use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Display;
use std::time::Duration;

use super::error::DispatchError;

/// Task id the external runner registers the transcription handler under.
pub const TRANSCRIBE_TASK_ID: &str = "transcribe-audio";

pub const DEFAULT_LANGUAGE: &str = "auto";

pub static TRANSCRIBE_TASK: Lazy<TaskDefinition> = Lazy::new(|| TaskDefinition {
    id: TRANSCRIBE_TASK_ID.to_string(),
    max_duration_secs: 3600,
    retry: RetryPolicy {
        max_attempts: 3,
        factor: 2.0,
        min_timeout_ms: 5_000,
        max_timeout_ms: 30_000,
        randomize: true,
    },
});

/// Returns the trimmed value when it is present and non-empty.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// A transcription job as delivered by the task runner.
///
/// Every field is optional on the wire; [`JobRequest::validate`] decides
/// whether the request is usable. Empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

impl JobRequest {
    pub fn job_id(&self) -> Option<&str> {
        non_empty(&self.job_id)
    }

    pub fn webhook_url(&self) -> Option<&str> {
        non_empty(&self.webhook_url)
    }

    /// Checks, in order, the job id, the input reference and the webhook.
    pub fn validate(&self) -> Result<ValidatedJob, DispatchError> {
        let job_id = self
            .job_id()
            .ok_or_else(|| DispatchError::Validation("job_id required".to_string()))?;

        let source = match (non_empty(&self.file_path), non_empty(&self.file_url)) {
            (Some(path), Some(url)) => InputSource::Both {
                path: path.to_string(),
                url: url.to_string(),
            },
            (Some(path), None) => InputSource::Path(path.to_string()),
            (None, Some(url)) => InputSource::Url(url.to_string()),
            (None, None) => {
                return Err(DispatchError::Validation(
                    "missing input reference".to_string(),
                ))
            }
        };

        let webhook_url = self
            .webhook_url()
            .ok_or_else(|| DispatchError::Validation("webhook_url required".to_string()))?;

        Ok(ValidatedJob {
            job_id: job_id.to_string(),
            source,
            language: non_empty(&self.language)
                .unwrap_or(DEFAULT_LANGUAGE)
                .to_string(),
            webhook_url: webhook_url.to_string(),
        })
    }
}

/// Where the compute side should read the media from. The reference is
/// passed through untouched; nothing is read locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Path(String),
    Url(String),
    Both { path: String, url: String },
}

impl InputSource {
    pub fn file_path(&self) -> Option<&str> {
        match self {
            Self::Path(path) | Self::Both { path, .. } => Some(path),
            Self::Url(_) => None,
        }
    }

    pub fn file_url(&self) -> Option<&str> {
        match self {
            Self::Url(url) | Self::Both { url, .. } => Some(url),
            Self::Path(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedJob {
    pub job_id: String,
    pub source: InputSource,
    pub language: String,
    pub webhook_url: String,
}

/// Body posted to the compute endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputePayload {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub language: String,
    pub webhook_url: String,
}

impl From<&ValidatedJob> for ComputePayload {
    fn from(job: &ValidatedJob) -> Self {
        Self {
            job_id: job.job_id.clone(),
            file_path: job.source.file_path().map(str::to_string),
            file_url: job.source.file_url().map(str::to_string),
            language: job.language.clone(),
            webhook_url: job.webhook_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Failed,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing => write!(f, "processing"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Status update posted to the caller's webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookNotification {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WebhookNotification {
    pub fn processing(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Processing,
            message: "transcription is being dispatched".to_string(),
            error_message: None,
        }
    }

    pub fn failed(job_id: &str, error: &DispatchError) -> Self {
        Self {
            job_id: job_id.to_string(),
            status: JobStatus::Failed,
            message: "failed to start transcription".to_string(),
            error_message: Some(error.to_string()),
        }
    }
}

/// Result handed back to the task runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub success: bool,
    pub job_id: String,
    pub message: String,
    pub detail: Value,
}

impl JobOutcome {
    pub fn dispatched(job_id: impl Into<String>, detail: Value) -> Self {
        Self {
            success: true,
            job_id: job_id.into(),
            message: "dispatch started".to_string(),
            detail,
        }
    }

    pub fn failed(job_id: impl Into<String>, error: &DispatchError) -> Self {
        Self {
            success: false,
            job_id: job_id.into(),
            message: "dispatch failed".to_string(),
            detail: json!({
                "error": error.to_string(),
                "kind": error.kind(),
                "retryable": error.is_retryable(),
            }),
        }
    }
}

/// Retry settings the external runner applies when a run returns an error.
/// Nothing in this crate retries on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub factor: f64,
    pub min_timeout_ms: u64,
    pub max_timeout_ms: u64,
    pub randomize: bool,
}

/// Registration metadata for a task, published to the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: String,
    pub max_duration_secs: u64,
    pub retry: RetryPolicy,
}

impl TaskDefinition {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}
