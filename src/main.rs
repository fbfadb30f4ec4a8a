#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};
use transcribe_dispatch::{
    config::{self, DispatchConfig}, init_env, utils::logger, AppContext
};

#[tokio::main]
async fn main() -> Result<()> {
    init_env();

    // logging first so configuration errors end up in the log
    let _guard = logger::init(&config::log_dir_from_env())?;

    info!("Starting transcription dispatch service...");

    let config = DispatchConfig::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;
    info!("Compute endpoint: {}", config::redact_url(&config.compute_endpoint));
    if config.compute_credential.is_none() {
        warn!("COMPUTE_TOKEN is not set, dispatching without an Authorization header");
    }

    let ctx = Arc::new(AppContext::from_config(&config)?);
    if ctx.runner.is_none() {
        info!("RUNNER_API_KEY is not set, run management routes are disabled");
    }

    info!("Starting HTTP server at http://{}", config.bind_addr);
    match transcribe_dispatch::web::start_server(ctx, config.bind_addr).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}
