pub mod types;
pub mod error;
pub mod callback;
pub mod compute;
pub mod processors;
pub mod registry;
#[cfg(test)]
mod tests;

// re-export main types
pub use types::{
    ComputePayload, InputSource, JobOutcome, JobRequest, JobStatus, RetryPolicy, TaskDefinition,
    ValidatedJob, WebhookNotification, TRANSCRIBE_TASK, TRANSCRIBE_TASK_ID,
};
pub use error::{DispatchError, WebhookNotifyError};

pub use callback::{HttpWebhookNotifier, WebhookNotifier};
pub use compute::{ComputeClient, HttpComputeClient};

pub use processors::{TaskProcessor, TranscriptionDispatchHandler};
pub use registry::TaskRegistry;
