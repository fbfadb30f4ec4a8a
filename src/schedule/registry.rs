use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::schedule::error::DispatchError;
use crate::schedule::processors::TaskProcessor;
use crate::schedule::types::{JobOutcome, TaskDefinition};

/// Maps task ids to the processors that handle them.
#[derive(Default)]
pub struct TaskRegistry {
    processors: HashMap<String, Arc<dyn TaskProcessor>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, processor: Arc<dyn TaskProcessor>) {
        let task_id = processor.definition().id.clone();
        info!("Registering processor for task: {}", task_id);
        self.processors.insert(task_id, processor);
    }

    pub fn get(&self, task_id: &str) -> Option<Arc<dyn TaskProcessor>> {
        self.processors.get(task_id).cloned()
    }

    /// Registered task definitions, sorted by id.
    pub fn definitions(&self) -> Vec<TaskDefinition> {
        let mut definitions: Vec<TaskDefinition> = self
            .processors
            .values()
            .map(|p| p.definition().clone())
            .collect();
        definitions.sort_by(|a, b| a.id.cmp(&b.id));
        definitions
    }

    pub async fn run(&self, task_id: &str, payload: Value) -> Result<JobOutcome, DispatchError> {
        let processor = self
            .get(task_id)
            .ok_or_else(|| DispatchError::Validation(format!("unknown task: {}", task_id)))?;
        processor.run(payload).await
    }
}
