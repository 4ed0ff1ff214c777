mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{stores, test_settings};
use endpoint_scan_rs::http_scan::HttpScanner;
use endpoint_scan_rs::port_scan::PortScanner;
use endpoint_scan_rs::server::{router, AppState};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

fn app(ui_dir: &std::path::Path) -> Router {
    let (store, session) = stores();
    let settings = test_settings();
    let state = AppState {
        http: Arc::new(HttpScanner::new(store.clone(), session.clone(), &settings).unwrap()),
        ports: Arc::new(PortScanner::new(store, session, &settings)),
    };
    router(state, ui_dir)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn status_starts_idle() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let (code, body) = call(&app, "GET", "/api/http/status", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["state"], json!("idle"));
    assert_eq!(body["progress"], json!(0));
}

#[tokio::test]
async fn configuration_errors_are_bad_requests() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let (code, body) = call(&app, "POST", "/api/http/start", Some(json!({}))).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no project"));

    let (code, _) = call(
        &app,
        "POST",
        "/api/ports/start",
        Some(json!({"host": "127.0.0.1", "ports": {"mode": "range", "value": "12-10"}})),
    )
    .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn control_on_idle_surface_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    for action in ["pause", "resume", "stop"] {
        let (code, _) = call(&app, "POST", &format!("/api/ports/{action}"), None).await;
        assert_eq!(code, StatusCode::CONFLICT, "{action}");
    }
    let (code, body) = call(&app, "POST", "/api/http/clear", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body["state"], json!("idle"));
}

#[tokio::test]
async fn selected_project_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let (code, _) = call(&app, "PUT", "/api/project/selected", Some(json!({"projectId": ""}))).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);

    let (code, _) = call(&app, "PUT", "/api/project/selected", Some(json!({"projectId": "p9"}))).await;
    assert_eq!(code, StatusCode::NO_CONTENT);
    let (_, body) = call(&app, "GET", "/api/project/selected", None).await;
    assert_eq!(body["projectId"], json!("p9"));
}

#[tokio::test]
async fn port_scan_over_api() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move { while listener.accept().await.is_ok() {} });

    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());
    let (code, body) = call(
        &app,
        "POST",
        "/api/ports/start",
        Some(json!({"host": "127.0.0.1", "ports": {"mode": "custom", "value": port.to_string()}})),
    )
    .await;
    assert_eq!(code, StatusCode::ACCEPTED);
    assert_eq!(body["total"], json!(1));

    let mut settled = false;
    for _ in 0..100 {
        let (_, status) = call(&app, "GET", "/api/ports/status", None).await;
        if status["state"] == json!("idle") && status["progress"] == json!(100) {
            settled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(settled, "port scan never completed");

    let (code, results) = call(&app, "GET", "/api/ports/results", None).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(results[0]["port"], json!(port));
    assert_eq!(results[0]["status"], json!("open"));
}
