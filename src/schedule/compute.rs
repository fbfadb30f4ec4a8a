use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

use crate::config::{Credential, DispatchConfig};
use crate::schedule::error::DispatchError;
use crate::schedule::types::ComputePayload;
use crate::utils::http::truncate_text;

// keep error bodies short enough for logs and webhook messages
const MAX_ERROR_BODY_CHARS: usize = 240;

/// The external service that performs the transcription.
#[async_trait]
pub trait ComputeClient: Send + Sync {
    /// Forwards one job. Called at most once per invocation.
    async fn submit(&self, payload: &ComputePayload) -> Result<Value, DispatchError>;
}

pub struct HttpComputeClient {
    client: reqwest::Client,
    endpoint: Url,
    credential: Option<Credential>,
}

impl HttpComputeClient {
    pub fn new(client: reqwest::Client, endpoint: Url, credential: Option<Credential>) -> Self {
        Self {
            client,
            endpoint,
            credential,
        }
    }

    pub fn from_config(client: reqwest::Client, config: &DispatchConfig) -> Self {
        Self::new(
            client,
            config.compute_endpoint.clone(),
            config.compute_credential.clone(),
        )
    }
}

#[async_trait]
impl ComputeClient for HttpComputeClient {
    async fn submit(&self, payload: &ComputePayload) -> Result<Value, DispatchError> {
        debug!(job_id = %payload.job_id, endpoint = %self.endpoint, "Submitting job to compute endpoint");

        let mut request = self.client.post(self.endpoint.clone()).json(payload);
        if let Some(credential) = &self.credential {
            request = request.bearer_auth(credential.secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| DispatchError::ComputeUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::ComputeRejected {
                status: status.as_u16(),
                body: truncate_text(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DispatchError::ComputeUnreachable(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| DispatchError::ComputeResponse(e.to_string()))
    }
}
