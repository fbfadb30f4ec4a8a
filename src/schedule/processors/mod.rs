pub mod transcribe;

use async_trait::async_trait;
use serde_json::Value;

use crate::schedule::error::DispatchError;
use crate::schedule::types::{JobOutcome, TaskDefinition};

pub use transcribe::TranscriptionDispatchHandler;

/// A task the external runner can invoke.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    fn definition(&self) -> &TaskDefinition;
    /// Runs one invocation with the raw task payload. An `Err` hands the
    /// failure back to the runner, whose retry policy takes over.
    async fn run(&self, payload: Value) -> Result<JobOutcome, DispatchError>;
}
