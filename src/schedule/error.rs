/// Failure of a single dispatch invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("compute endpoint returned {status}: {body}")]
    ComputeRejected { status: u16, body: String },

    #[error("compute endpoint unreachable: {0}")]
    ComputeUnreachable(String),

    #[error("invalid compute response: {0}")]
    ComputeResponse(String),
}

impl DispatchError {
    /// Validation and configuration failures are deterministic; running the
    /// same request again cannot succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation(_) | Self::Configuration(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Configuration(_) => "configuration",
            Self::ComputeRejected { .. } | Self::ComputeUnreachable(_) | Self::ComputeResponse(_) => {
                "dispatch"
            }
        }
    }
}

/// Failure of a webhook notification. Logged and dropped by the handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookNotifyError {
    #[error("webhook responded with status {status}")]
    Rejected { status: u16 },

    #[error("webhook unreachable: {0}")]
    Unreachable(String),
}
