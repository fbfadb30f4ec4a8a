use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use crate::AppContext;

pub mod runs;
pub mod tasks;

pub fn router(ctx: Arc<AppContext>) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .merge(tasks::task_router(ctx.registry.clone()));

    // run management needs a runner API key
    match &ctx.runner {
        Some(runner) => router.merge(runs::run_router(runner.clone())),
        None => router,
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
