use super::*;
use crate::config::Credential;
use crate::runner::RunnerClient;
use crate::web;
use crate::AppContext;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode, Uri};
use axum::routing::post;
use axum::{Json, Router};
use reqwest::Url;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

// Records every request a stub receives
#[derive(Debug, Clone)]
struct Received {
    path: String,
    authorization: Option<String>,
    body: Value,
}

#[derive(Clone)]
struct Stub {
    received: Arc<Mutex<Vec<Received>>>,
    status: StatusCode,
    reply: Value,
}

async fn record(
    State(stub): State<Stub>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    stub.received.lock().await.push(Received {
        path: uri.path().to_string(),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });
    (stub.status, Json(stub.reply.clone()))
}

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_stub(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Vec<Received>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let stub = Stub {
        received: received.clone(),
        status,
        reply,
    };
    let url = spawn(Router::new().fallback(record).with_state(stub)).await;
    (url, received)
}

fn http_handler(compute_base: &str, token: Option<&str>) -> TranscriptionDispatchHandler {
    let client = reqwest::Client::new();
    let endpoint = Url::parse(&format!("{}/transcribe", compute_base)).unwrap();
    TranscriptionDispatchHandler::new(
        Arc::new(HttpComputeClient::new(client.clone(), endpoint, token.map(Credential::new))),
        Arc::new(HttpWebhookNotifier::new(client)),
    )
}

fn job(job_id: &str, webhook_url: &str) -> JobRequest {
    JobRequest {
        job_id: Some(job_id.to_string()),
        file_url: Some("https://cdn.example.com/meeting.mp3".to_string()),
        webhook_url: Some(webhook_url.to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_http_dispatch_success() {
    let (compute, compute_calls) = spawn_stub(StatusCode::OK, json!({"status": "accepted"})).await;
    let (hooks, hook_calls) = spawn_stub(StatusCode::OK, json!({})).await;
    let webhook_url = format!("{}/webhooks/transcription", hooks);
    let handler = http_handler(&compute, Some("secret-token"));

    let outcome = handler.dispatch(job("job-1", &webhook_url)).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.detail, json!({"status": "accepted"}));

    let compute_calls = compute_calls.lock().await;
    assert_eq!(compute_calls.len(), 1);
    assert_eq!(compute_calls[0].path, "/transcribe");
    assert_eq!(compute_calls[0].authorization.as_deref(), Some("Bearer secret-token"));
    assert_eq!(
        compute_calls[0].body,
        json!({
            "job_id": "job-1",
            "file_url": "https://cdn.example.com/meeting.mp3",
            "language": "auto",
            "webhook_url": webhook_url,
        })
    );

    let hook_calls = hook_calls.lock().await;
    assert_eq!(hook_calls.len(), 1);
    assert_eq!(hook_calls[0].path, "/webhooks/transcription");
    assert_eq!(hook_calls[0].body["status"], "processing");
    assert_eq!(hook_calls[0].body["job_id"], "job-1");
}

#[tokio::test]
async fn test_http_dispatch_without_credential() {
    let (compute, compute_calls) = spawn_stub(StatusCode::OK, json!({"status": "accepted"})).await;
    let (hooks, _) = spawn_stub(StatusCode::OK, json!({})).await;

    http_handler(&compute, None)
        .dispatch(job("job-2", &hooks))
        .await
        .unwrap();

    assert_eq!(compute_calls.lock().await[0].authorization, None);
}

#[tokio::test]
async fn test_http_compute_error_notifies_failure() {
    let (compute, _) = spawn_stub(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": "gpu pool exhausted"}),
    )
    .await;
    let (hooks, hook_calls) = spawn_stub(StatusCode::OK, json!({})).await;

    let err = http_handler(&compute, Some("secret-token"))
        .dispatch(job("job-3", &hooks))
        .await
        .unwrap_err();

    match &err {
        DispatchError::ComputeRejected { status, body } => {
            assert_eq!(*status, 500);
            assert!(body.contains("gpu pool exhausted"));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let hook_calls = hook_calls.lock().await;
    assert_eq!(hook_calls.len(), 2);
    assert_eq!(hook_calls[0].body["status"], "processing");
    assert_eq!(hook_calls[1].body["status"], "failed");
    assert_eq!(hook_calls[1].body["error_message"], err.to_string());
}

#[tokio::test]
async fn test_http_unreachable_webhook_keeps_dispatch_error() {
    let (compute, _) = spawn_stub(StatusCode::INTERNAL_SERVER_ERROR, json!({})).await;

    // nothing listens on port 1
    let err = http_handler(&compute, None)
        .dispatch(job("job-4", "http://127.0.0.1:1/webhooks/transcription"))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::ComputeRejected { status: 500, .. }));
}

#[tokio::test]
async fn test_http_malformed_webhook_is_not_fatal() {
    let (compute, _) = spawn_stub(StatusCode::OK, json!({"status": "accepted"})).await;

    let outcome = http_handler(&compute, None)
        .dispatch(job("job-5", "not a url"))
        .await
        .unwrap();

    assert!(outcome.success);
}

#[tokio::test]
async fn test_http_rejecting_webhook_does_not_change_outcome() {
    let (compute, _) = spawn_stub(StatusCode::OK, json!({"status": "accepted"})).await;
    let (hooks, hook_calls) = spawn_stub(StatusCode::NOT_FOUND, json!({})).await;

    let outcome = http_handler(&compute, None)
        .dispatch(job("job-6", &hooks))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(hook_calls.lock().await.len(), 1);
}

#[tokio::test]
async fn test_http_compute_unreachable() {
    let (hooks, hook_calls) = spawn_stub(StatusCode::OK, json!({})).await;

    let err = http_handler("http://127.0.0.1:1", None)
        .dispatch(job("job-7", &hooks))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::ComputeUnreachable(_)));
    assert!(err.is_retryable());
    assert_eq!(hook_calls.lock().await.len(), 2);
}

#[tokio::test]
async fn test_http_compute_non_json_body() {
    let compute = spawn(Router::new().route("/transcribe", post(|| async { "queued" }))).await;
    let (hooks, _) = spawn_stub(StatusCode::OK, json!({})).await;

    let err = http_handler(&compute, None)
        .dispatch(job("job-8", &hooks))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::ComputeResponse(_)));
}

async fn spawn_service(compute: &str) -> String {
    spawn_service_with(compute, None).await
}

async fn spawn_service_with(compute: &str, runner: Option<RunnerClient>) -> String {
    let mut registry = TaskRegistry::new();
    registry.register(Arc::new(http_handler(compute, None)));
    let ctx = Arc::new(AppContext {
        registry: Arc::new(registry),
        runner: runner.map(Arc::new),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        web::serve(ctx, listener).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_task_endpoint() {
    let (compute, _) = spawn_stub(StatusCode::OK, json!({"status": "accepted"})).await;
    let (hooks, _) = spawn_stub(StatusCode::OK, json!({})).await;
    let service = spawn_service(&compute).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", service))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "healthy");

    let tasks: Value = client
        .get(format!("{}/tasks", service))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tasks["data"][0]["id"], TRANSCRIBE_TASK_ID);
    assert_eq!(tasks["data"][0]["max_duration_secs"], 3600);

    let response = client
        .post(format!("{}/tasks/{}/run", service, TRANSCRIBE_TASK_ID))
        .json(&job("job-9", &hooks))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let outcome: JobOutcome = response.json().await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.job_id, "job-9");
}

#[tokio::test]
async fn test_task_endpoint_failures() {
    let (compute, _) = spawn_stub(StatusCode::SERVICE_UNAVAILABLE, json!({})).await;
    let (hooks, _) = spawn_stub(StatusCode::OK, json!({})).await;
    let service = spawn_service(&compute).await;
    let client = reqwest::Client::new();
    let run_url = format!("{}/tasks/{}/run", service, TRANSCRIBE_TASK_ID);

    let invalid = JobRequest {
        file_url: None,
        ..job("job-10", &hooks)
    };
    let response = client.post(&run_url).json(&invalid).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.headers()["x-should-retry"], "false");
    let outcome: JobOutcome = response.json().await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.job_id, "job-10");
    assert_eq!(outcome.detail["kind"], "validation");

    let response = client.post(&run_url).json(&job("job-11", &hooks)).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    assert_eq!(response.headers()["x-should-retry"], "true");

    let response = client
        .post(format!("{}/tasks/resize-video/run", service))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

fn runner_client(base: &str) -> RunnerClient {
    RunnerClient::new(
        reqwest::Client::new(),
        base,
        Some(Credential::new("tr_dev_123")),
        Some("https://app.example.com/webhooks/transcription".to_string()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_runner_trigger() {
    let (runner, calls) = spawn_stub(StatusCode::OK, json!({"id": "run_123"})).await;

    let handle = runner_client(&runner)
        .trigger(JobRequest {
            file_path: Some("uploads/meeting.wav".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(handle.run_id, "run_123");
    assert!(!handle.job_id.is_empty());

    let calls = calls.lock().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].path, "/api/v1/runs");
    assert_eq!(calls[0].authorization.as_deref(), Some("Bearer tr_dev_123"));
    assert_eq!(calls[0].body["task"], TRANSCRIBE_TASK_ID);
    let payload = &calls[0].body["payload"];
    assert_eq!(payload["job_id"], handle.job_id.as_str());
    assert_eq!(payload["file_path"], "uploads/meeting.wav");
    assert_eq!(payload["webhook_url"], "https://app.example.com/webhooks/transcription");
}

#[tokio::test]
async fn test_runner_status_and_cancel() {
    let (runner, calls) = spawn_stub(
        StatusCode::OK,
        json!({"id": "run_123", "status": "QUEUED", "createdAt": "2024-05-01T10:00:00Z"}),
    )
    .await;
    let client = runner_client(&runner);

    let status = client.run_status("run_123").await.unwrap();
    assert_eq!(status.status, "QUEUED");
    assert!(client.cancel("run_123").await);

    let calls = calls.lock().await;
    assert_eq!(calls[0].path, "/api/v1/runs/run_123");
    assert_eq!(calls[1].path, "/api/v1/runs/run_123/cancel");
}

#[tokio::test]
async fn test_runner_errors() {
    let (runner, _) = spawn_stub(StatusCode::NOT_FOUND, json!({"error": "run not found"})).await;
    let client = runner_client(&runner);

    let err = client.run_status("run_missing").await.unwrap_err();
    assert!(matches!(err, crate::runner::RunnerError::Rejected { status: 404, .. }));
    assert!(!client.cancel("run_missing").await);
}

#[tokio::test]
async fn test_runner_trigger_without_run_id() {
    let (runner, _) = spawn_stub(StatusCode::OK, json!({"foo": 1})).await;

    let err = runner_client(&runner)
        .trigger(job("job-12", "https://app.example.com/webhooks/transcription"))
        .await
        .unwrap_err();

    assert!(matches!(err, crate::runner::RunnerError::Response(_)));
}

#[tokio::test]
async fn test_run_routes_disabled_without_runner() {
    let (compute, _) = spawn_stub(StatusCode::OK, json!({})).await;
    let service = spawn_service(&compute).await;

    let response = reqwest::Client::new()
        .get(format!("{}/runs/run_123", service))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_run_endpoints() {
    let (compute, _) = spawn_stub(StatusCode::OK, json!({})).await;
    let (runner, runner_calls) = spawn_stub(
        StatusCode::OK,
        json!({"id": "run_123", "status": "QUEUED", "createdAt": "2024-05-01T10:00:00Z"}),
    )
    .await;
    let service = spawn_service_with(&compute, Some(runner_client(&runner))).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/runs", service))
        .json(&json!({"file_url": "https://cdn.example.com/meeting.mp3"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["run_id"], "run_123");
    assert!(!body["data"]["job_id"].as_str().unwrap().is_empty());

    let response = client
        .post(format!("{}/runs", service))
        .json(&json!({"job_id": "job-13"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("missing input reference"));

    let body: Value = client
        .get(format!("{}/runs/run_123", service))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["status"], "QUEUED");

    let body: Value = client
        .post(format!("{}/runs/run_123/cancel", service))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["data"]["cancelled"], true);

    // the invalid request never reached the runner
    let paths: Vec<String> = runner_calls.lock().await.iter().map(|r| r.path.clone()).collect();
    assert_eq!(
        paths,
        vec!["/api/v1/runs", "/api/v1/runs/run_123", "/api/v1/runs/run_123/cancel"]
    );
}

#[tokio::test]
async fn test_run_endpoint_errors() {
    let (compute, _) = spawn_stub(StatusCode::OK, json!({})).await;
    let (runner, _) = spawn_stub(StatusCode::NOT_FOUND, json!({"error": "run not found"})).await;
    let service = spawn_service_with(&compute, Some(runner_client(&runner))).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/runs/run_missing", service))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);

    let response = client
        .post(format!("{}/runs/run_missing/cancel", service))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "failed to cancel run run_missing");

    // an unreachable runner surfaces as a bad gateway
    let service = spawn_service_with(&compute, Some(runner_client("http://127.0.0.1:1"))).await;
    let response = client
        .post(format!("{}/runs", service))
        .json(&json!({"file_url": "https://cdn.example.com/meeting.mp3"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
}
