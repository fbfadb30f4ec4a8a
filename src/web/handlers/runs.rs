use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::runner::{RunnerClient, RunnerError};
use crate::schedule::{DispatchError, JobRequest};
use crate::utils::http::ApiResponse;

pub fn run_router(runner: Arc<RunnerClient>) -> Router {
    Router::new()
        .route("/runs", post(create_run))
        .route("/runs/:run_id", get(get_run))
        .route("/runs/:run_id/cancel", post(cancel_run))
        .with_state(runner)
}

#[derive(Debug, Serialize)]
struct CancelResult {
    run_id: String,
    cancelled: bool,
}

fn status_for(error: &RunnerError) -> StatusCode {
    match error {
        RunnerError::Dispatch(DispatchError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        RunnerError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        RunnerError::Rejected { status: 404, .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

// Submit a transcription job to the task runner
async fn create_run(
    State(runner): State<Arc<RunnerClient>>,
    Json(request): Json<JobRequest>,
) -> impl IntoResponse {
    match runner.trigger(request).await {
        Ok(handle) => (StatusCode::ACCEPTED, Json(ApiResponse::success(handle))).into_response(),
        Err(e) => {
            error!("Failed to create run: {}", e);
            (status_for(&e), Json(ApiResponse::<()>::error(e.to_string()))).into_response()
        }
    }
}

async fn get_run(
    State(runner): State<Arc<RunnerClient>>,
    Path(run_id): Path<String>,
) -> impl IntoResponse {
    match runner.run_status(&run_id).await {
        Ok(status) => (StatusCode::OK, Json(ApiResponse::success(status))).into_response(),
        Err(e) => {
            error!("Failed to get run {}: {}", run_id, e);
            (status_for(&e), Json(ApiResponse::<()>::error(e.to_string()))).into_response()
        }
    }
}

async fn cancel_run(
    State(runner): State<Arc<RunnerClient>>,
    Path(run_id): Path<String>,
) -> impl IntoResponse {
    if runner.cancel(&run_id).await {
        let result = CancelResult { run_id, cancelled: true };
        (StatusCode::OK, Json(ApiResponse::success(result))).into_response()
    } else {
        let message = format!("failed to cancel run {}", run_id);
        (StatusCode::BAD_GATEWAY, Json(ApiResponse::<()>::error(message))).into_response()
    }
}
