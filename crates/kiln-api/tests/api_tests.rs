//! API tests against the router with an in-memory store.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use futures::StreamExt;
use kiln_api::{AppState, create_router};
use kiln_db::MemoryBuildStore;
use kiln_events::BroadcastEventSink;
use kiln_runner::{RunnerConfig, ShellRunner, StaticChangeDetector};
use kiln_scheduler::{Orchestrator, OrchestratorConfig};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    _workspace: tempfile::TempDir,
}

fn test_app() -> TestApp {
    let workspace = tempfile::tempdir().unwrap();
    let events = BroadcastEventSink::new();
    let orchestrator = Orchestrator::new(
        Arc::new(MemoryBuildStore::new()),
        Arc::new(events.clone()),
        Arc::new(StaticChangeDetector::unknown()),
        Arc::new(ShellRunner::new(
            RunnerConfig::default().with_workspace(workspace.path()),
        )),
        OrchestratorConfig::default(),
    );
    let state = AppState::new(orchestrator, events);

    TestApp {
        router: create_router(Arc::new(state)),
        _workspace: workspace,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn wait_for_terminal(app: &TestApp, build_id: &str) -> Value {
    for _ in 0..100 {
        let (status, body) = send(app, get(&format!("/api/build/{}", build_id))).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "success" || body["status"] == "failed" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("build {} did not finish", build_id);
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = test_app();

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_trigger_and_fetch_build() {
    let app = test_app();
    let payload = json!({
        "tasks": [
            { "id": "a", "command": "echo a" },
            { "id": "b", "command": "echo b", "dependencies": ["a"] }
        ]
    });

    let (status, body) = send(&app, post_json("/api/build", &payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Build triggered");
    assert_eq!(body["status"], "pending");

    let build_id = body["buildId"].as_str().unwrap().to_string();
    let build = wait_for_terminal(&app, &build_id).await;

    assert_eq!(build["status"], "success");
    assert_eq!(build["trigger"], "manual");
    assert_eq!(build["triggeredBy"], "user");
    assert!(build["endTime"].is_string());
    assert!(
        build["logs"]
            .as_array()
            .unwrap()
            .iter()
            .any(|l| l == "Build completed successfully.")
    );
}

#[tokio::test]
async fn test_missing_tasks_is_bad_request() {
    let app = test_app();

    for payload in [json!({}), json!({ "tasks": [] })] {
        let (status, body) = send(&app, post_json("/api/build", &payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid build configuration provided.");
    }

    let (_, builds) = send(&app, get("/api/builds")).await;
    assert_eq!(builds, json!([]));
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = test_app();
    let request = Request::post("/api/build")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid build configuration provided.");
}

#[tokio::test]
async fn test_graph_errors_surface_as_failed_builds() {
    let app = test_app();
    let payload = json!({ "tasks": [ { "id": "x", "command": "true", "dependencies": ["y"] } ] });

    let (status, body) = send(&app, post_json("/api/build", &payload)).await;
    assert_eq!(status, StatusCode::OK);

    let build = wait_for_terminal(&app, body["buildId"].as_str().unwrap()).await;
    assert_eq!(build["status"], "failed");
}

#[tokio::test]
async fn test_webhook_trigger() {
    let app = test_app();
    let payload = json!({ "tasks": [ { "id": "a", "command": "true" } ], "triggeredBy": "github" });

    let (status, body) = send(&app, post_json("/api/webhook", &payload)).await;
    assert_eq!(status, StatusCode::OK);

    let build = wait_for_terminal(&app, body["buildId"].as_str().unwrap()).await;
    assert_eq!(build["trigger"], "webhook");
    assert_eq!(build["triggeredBy"], "github");
}

#[tokio::test]
async fn test_get_build_errors() {
    let app = test_app();

    let (status, body) = send(&app, get("/api/build/0190b6c4-0000-7000-8000-000000000000")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Build not found");

    let (status, _) = send(&app, get("/api/build/not-an-id")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_builds_newest_first() {
    let app = test_app();
    let payload = json!({ "tasks": [ { "id": "a", "command": "true" } ] });

    let (_, first) = send(&app, post_json("/api/build", &payload)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    let (_, second) = send(&app, post_json("/api/build", &payload)).await;

    let (status, builds) = send(&app, get("/api/builds")).await;
    assert_eq!(status, StatusCode::OK);
    let builds = builds.as_array().unwrap();
    assert_eq!(builds.len(), 2);
    assert_eq!(builds[0]["id"], second["buildId"]);
    assert_eq!(builds[1]["id"], first["buildId"]);

    let (_, limited) = send(&app, get("/api/builds?limit=1")).await;
    assert_eq!(limited.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_websocket_streams_build_events() {
    let app = test_app();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router.clone();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .unwrap();

    let payload = json!({ "tasks": [ { "id": "a", "command": "true" } ] });
    let (status, _) = send(&app, post_json("/api/build", &payload)).await;
    assert_eq!(status, StatusCode::OK);

    let mut names = Vec::new();
    while let Ok(Some(Ok(frame))) =
        tokio::time::timeout(Duration::from_secs(5), socket.next()).await
    {
        let event: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        let name = event["event"].as_str().unwrap().to_string();
        let done = name == "build-update" && event["payload"]["status"] == "success";
        names.push(name);
        if done {
            break;
        }
    }

    assert_eq!(names.first().map(String::as_str), Some("build-start"));
    assert!(names.iter().any(|n| n == "log"));
    assert_eq!(names.last().map(String::as_str), Some("build-update"));
}
