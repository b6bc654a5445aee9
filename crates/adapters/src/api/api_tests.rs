// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use pba_core::Config;
use pba_wire::{FailRequest, ProgressReport};

use super::*;

const AGENT_UUID: &str = "2f4f1e9c-9a1b-4a50-8a9e-000000000001";

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client_for(base_url: String) -> ApiClient {
    let mut config = Config::default();
    config.server.url = base_url;
    config.agent.uuid = AGENT_UUID.to_string();
    config.agent.name = "test-agent".to_string();
    ApiClient::new(&config).unwrap()
}

fn ok(data: serde_json::Value) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "",
        "data": data,
    }))
}

#[tokio::test]
async fn every_request_carries_the_uuid_as_bearer_token() {
    let router = Router::new().route(
        "/agent/tasks",
        get(|headers: HeaderMap| async move {
            let auth = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            if auth == format!("Bearer {}", AGENT_UUID) {
                ok(serde_json::json!({"tasks": [], "count": 0}))
            } else {
                Json(serde_json::json!({
                    "success": false,
                    "error": {"message": "bad token", "code": "AUTH"}
                }))
            }
        }),
    );
    let client = client_for(serve(router).await);

    let page = client.fetch_tasks().await.unwrap();
    assert_eq!(page.count, 0);
}

#[tokio::test]
async fn envelope_failure_propagates_error_message() {
    let router = Router::new().route(
        "/agent/tasks/7/start",
        post(|| async {
            Json(serde_json::json!({
                "success": false,
                "message": "",
                "data": null,
                "error": {"message": "task already claimed", "code": "CONFLICT"}
            }))
        }),
    );
    let client = client_for(serve(router).await);

    let err = client.mark_started(7).await.unwrap_err();
    match err {
        ApiError::Api { message, code } => {
            assert_eq!(message, "task already claimed");
            assert_eq!(code, "CONFLICT");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn non_2xx_without_envelope_reports_raw_body() {
    let router = Router::new().route(
        "/agent/heartbeat",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream exploded") }),
    );
    let client = client_for(serve(router).await);

    let request = HeartbeatRequest {
        version: "2.3.5".to_string(),
        capabilities: serde_json::Value::Null,
        os_info: String::new(),
    };
    let err = client.heartbeat(&request).await.unwrap_err();
    match err {
        ApiError::Status { status, body } => {
            assert_eq!(status, 502);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("expected Status error, got {:?}", other),
    }
}

#[tokio::test]
async fn tasks_decode_from_the_data_field() {
    let router = Router::new().route(
        "/agent/tasks",
        get(|| async {
            ok(serde_json::json!({
                "tasks": [
                    {"id": 1, "type": "test", "payload": {"message": "hi"}},
                    {"id": 2, "type": "stats_collect"}
                ],
                "count": 2
            }))
        }),
    );
    let client = client_for(serve(router).await);

    let page = client.fetch_tasks().await.unwrap();
    assert_eq!(page.count, 2);
    assert_eq!(page.tasks[0].id, 1);
    assert_eq!(page.tasks[1].kind, pba_core::TaskKind::StatsCollect);
}

#[tokio::test]
async fn unit_operations_accept_null_data() {
    let router = Router::new()
        .route(
            "/agent/tasks/3/progress",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["progress"], 40);
                ok(serde_json::Value::Null)
            }),
        )
        .route(
            "/agent/tasks/3/fail",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["exit_code"], 2);
                ok(serde_json::Value::Null)
            }),
        );
    let client = client_for(serve(router).await);

    client
        .report_progress(3, &ProgressReport::percent(40, "working"))
        .await
        .unwrap();
    client
        .fail(
            3,
            &FailRequest {
                error: "borg create failed".to_string(),
                exit_code: 2,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn download_streams_the_body_to_disk() {
    #[derive(Clone)]
    struct Blob(&'static [u8]);

    let router = Router::new()
        .route(
            "/agent/update/download",
            get(|State(Blob(bytes)): State<Blob>| async move { bytes.to_vec() }),
        )
        .with_state(Blob(b"#!/bin/sh\nexit 0\n"));
    let client = client_for(serve(router).await);

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("phpborg-agent.new");
    client.download_update(&dest).await.unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), b"#!/bin/sh\nexit 0\n");
}

#[tokio::test]
async fn download_failure_reports_status_and_body() {
    let router = Router::new().route(
        "/agent/update/download",
        get(|| async { (StatusCode::NOT_FOUND, "no release staged") }),
    );
    let client = client_for(serve(router).await);

    let dir = tempfile::tempdir().unwrap();
    let err = client
        .download_update(&dir.path().join("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 404, .. }));
}

#[test]
fn missing_certificate_files_fail_construction() {
    let mut config = Config::default();
    config.server.url = "https://phpborg.example.com/api".to_string();
    config.agent.uuid = AGENT_UUID.to_string();
    config.agent.name = "test-agent".to_string();
    config.tls.cert_file = "/nonexistent/agent.crt".to_string();
    config.tls.key_file = "/nonexistent/agent.key".to_string();
    config.tls.ca_file = "/nonexistent/ca.crt".to_string();

    let err = ApiClient::new(&config).unwrap_err();
    assert!(matches!(err, ApiError::Certificate { .. }));
}
