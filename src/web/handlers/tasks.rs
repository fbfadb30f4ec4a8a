use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use crate::schedule::{DispatchError, JobOutcome, TaskRegistry};
use crate::utils::http::ApiResponse;

/// Tells the runner whether a failed run is worth retrying.
pub const SHOULD_RETRY_HEADER: &str = "x-should-retry";

pub fn task_router(registry: Arc<TaskRegistry>) -> Router {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks/:task_id/run", post(run_task))
        .with_state(registry)
}

async fn list_tasks(State(registry): State<Arc<TaskRegistry>>) -> impl IntoResponse {
    Json(ApiResponse::success(registry.definitions()))
}

// Invoked by the task runner once per attempt
async fn run_task(
    State(registry): State<Arc<TaskRegistry>>,
    Path(task_id): Path<String>,
    Json(payload): Json<Value>,
) -> Response {
    let Some(processor) = registry.get(&task_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(format!("unknown task: {}", task_id))),
        )
            .into_response();
    };

    let job_id = payload
        .get("job_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match processor.run(payload).await {
        Ok(outcome) => {
            info!(task_id = %task_id, job_id = %outcome.job_id, "Run completed");
            (StatusCode::OK, Json(outcome)).into_response()
        }
        Err(e) => {
            error!(task_id = %task_id, job_id = %job_id, "Run failed: {}", e);
            let retry = if e.is_retryable() { "true" } else { "false" };
            (
                status_for(&e),
                [(SHOULD_RETRY_HEADER, retry)],
                Json(JobOutcome::failed(job_id, &e)),
            )
                .into_response()
        }
    }
}

fn status_for(error: &DispatchError) -> StatusCode {
    match error {
        DispatchError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DispatchError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        DispatchError::ComputeRejected { .. }
        | DispatchError::ComputeUnreachable(_)
        | DispatchError::ComputeResponse(_) => StatusCode::BAD_GATEWAY,
    }
}
