pub mod config;
pub mod runner;
pub mod schedule;
pub mod utils;
pub mod web;

use std::sync::Arc;
use config::DispatchConfig;
use runner::{RunnerClient, RunnerError};
use schedule::{TaskRegistry, TranscriptionDispatchHandler};

pub struct AppContext {
    pub registry: Arc<TaskRegistry>,
    pub runner: Option<Arc<RunnerClient>>,
}

impl AppContext {
    /// Wires the HTTP-backed handler and, when a runner API key is set, the
    /// runner client.
    pub fn from_config(config: &DispatchConfig) -> Result<Self, RunnerError> {
        let mut registry = TaskRegistry::new();
        registry.register(Arc::new(TranscriptionDispatchHandler::from_config(config)));

        let runner = match config.runner.api_key {
            Some(_) => Some(Arc::new(RunnerClient::from_config(config)?)),
            None => None,
        };

        Ok(Self {
            registry: Arc::new(registry),
            runner,
        })
    }
}

/// Loads `.env` into the process environment. A missing file is fine.
pub fn init_env() {
    dotenv::dotenv().ok();
}
