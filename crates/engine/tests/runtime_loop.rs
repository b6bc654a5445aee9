// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end runtime scenarios against an in-memory control plane.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use pba_adapters::ApiClient;
use pba_core::Config;
use pba_engine::Runtime;
use tokio_util::sync::CancellationToken;

/// Everything the fixture server observed, in arrival order.
#[derive(Default)]
struct ControlPlane {
    offers: Mutex<Vec<serde_json::Value>>,
    heartbeats: Mutex<Vec<serde_json::Value>>,
    started: Mutex<Vec<i64>>,
    progress: Mutex<Vec<(i64, serde_json::Value)>>,
    completed: Mutex<Vec<(i64, serde_json::Value)>>,
    failed: Mutex<Vec<(i64, serde_json::Value)>>,
    cancel_ids: Mutex<HashSet<i64>>,
}

fn ok(data: serde_json::Value) -> Json<serde_json::Value> {
    Json(serde_json::json!({"success": true, "message": "", "data": data}))
}

async fn serve(state: Arc<ControlPlane>) -> String {
    let router = Router::new()
        .route(
            "/agent/heartbeat",
            post(
                |State(cp): State<Arc<ControlPlane>>, Json(body): Json<serde_json::Value>| async move {
                    cp.heartbeats.lock().push(body);
                    ok(serde_json::json!({"server_time": "", "next_heartbeat_in": 60}))
                },
            ),
        )
        .route(
            "/agent/tasks",
            get(|State(cp): State<Arc<ControlPlane>>| async move {
                let tasks: Vec<serde_json::Value> = cp.offers.lock().drain(..).collect();
                let count = tasks.len();
                ok(serde_json::json!({"tasks": tasks, "count": count}))
            }),
        )
        .route(
            "/agent/tasks/:id/start",
            post(
                |Path(id): Path<i64>, State(cp): State<Arc<ControlPlane>>| async move {
                    cp.started.lock().push(id);
                    ok(serde_json::Value::Null)
                },
            ),
        )
        .route(
            "/agent/tasks/:id/progress",
            post(
                |Path(id): Path<i64>,
                 State(cp): State<Arc<ControlPlane>>,
                 Json(body): Json<serde_json::Value>| async move {
                    cp.progress.lock().push((id, body));
                    ok(serde_json::Value::Null)
                },
            ),
        )
        .route(
            "/agent/tasks/:id/status",
            get(
                |Path(id): Path<i64>, State(cp): State<Arc<ControlPlane>>| async move {
                    let should_cancel = cp.cancel_ids.lock().contains(&id);
                    ok(serde_json::json!({"status": "running", "should_cancel": should_cancel}))
                },
            ),
        )
        .route(
            "/agent/tasks/:id/complete",
            post(
                |Path(id): Path<i64>,
                 State(cp): State<Arc<ControlPlane>>,
                 Json(body): Json<serde_json::Value>| async move {
                    cp.completed.lock().push((id, body));
                    ok(serde_json::Value::Null)
                },
            ),
        )
        .route(
            "/agent/tasks/:id/fail",
            post(
                |Path(id): Path<i64>,
                 State(cp): State<Arc<ControlPlane>>,
                 Json(body): Json<serde_json::Value>| async move {
                    cp.failed.lock().push((id, body));
                    ok(serde_json::Value::Null)
                },
            ),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn agent_config(base_url: String) -> Config {
    let mut config = Config::default();
    config.server.url = base_url;
    config.agent.uuid = "2f4f1e9c-9a1b-4a50-8a9e-000000000001".to_string();
    config.agent.name = "fixture-agent".to_string();
    config.agent.version = "2.3.5".to_string();
    config.polling.interval_secs = 1;
    config.polling.heartbeat_interval_secs = 60;
    config
}

fn test_task(id: i64, message: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "type": "test",
        "priority": "normal",
        "payload": {"message": message},
        "timeout_seconds": 30,
        "created_at": "2026-08-01T00:00:00Z",
    })
}

async fn wait_until(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    condition()
}

#[tokio::test]
async fn test_task_reports_start_then_progress_then_one_completion() {
    let cp = Arc::new(ControlPlane::default());
    cp.offers.lock().push(test_task(1, "hi"));

    let config = Arc::new(agent_config(serve(cp.clone()).await));
    let client = Arc::new(ApiClient::new(&config).unwrap());
    let runtime = Runtime::new(client, config);

    let shutdown = CancellationToken::new();
    let run = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { runtime.run(shutdown).await })
    };

    assert!(
        wait_until(|| !cp.completed.lock().is_empty(), Duration::from_secs(15)).await,
        "task never completed"
    );
    shutdown.cancel();
    run.await.unwrap();

    // The priming heartbeat carried a capability report.
    let heartbeats = cp.heartbeats.lock();
    assert!(!heartbeats.is_empty());
    assert!(heartbeats[0]["capabilities"]["databases"].is_array());
    drop(heartbeats);

    // start precedes progress precedes the single terminal report.
    assert_eq!(*cp.started.lock(), vec![1]);

    let progress = cp.progress.lock();
    let percents: Vec<i64> = progress
        .iter()
        .map(|(id, body)| {
            assert_eq!(*id, 1);
            body["progress"].as_i64().unwrap()
        })
        .collect();
    assert_eq!(percents, vec![0, 20, 40, 60, 80, 100]);
    drop(progress);

    let completed = cp.completed.lock();
    assert_eq!(completed.len(), 1);
    assert!(cp.failed.lock().is_empty());

    let (id, body) = &completed[0];
    assert_eq!(*id, 1);
    assert_eq!(body["exit_code"], 0);
    assert_eq!(body["result"]["message"], "hi");
    let time = body["result"]["time"].as_str().unwrap();
    chrono::DateTime::parse_from_rfc3339(time).unwrap();
}

#[tokio::test]
async fn a_single_burst_never_exceeds_workers_plus_queue_capacity() {
    let cp = Arc::new(ControlPlane::default());
    {
        let mut offers = cp.offers.lock();
        for id in 1..=30 {
            offers.push(test_task(id, "burst"));
        }
    }

    let config = Arc::new(agent_config(serve(cp.clone()).await));
    let client = Arc::new(ApiClient::new(&config).unwrap());
    let runtime = Runtime::new(client, config);

    let shutdown = CancellationToken::new();
    let run = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { runtime.run(shutdown).await })
    };

    // Let the burst land and a couple of tasks churn, then stop.
    tokio::time::sleep(Duration::from_millis(5200)).await;
    shutdown.cancel();
    run.await.unwrap();

    // 2 workers + 10 queue slots: everything else was dropped unacked.
    let started = cp.started.lock().clone();
    assert!(!started.is_empty());
    assert!(
        started.len() <= 12,
        "accepted {} tasks, expected at most 12",
        started.len()
    );

    // At most one terminal state per task, and only for started tasks.
    let started_set: HashSet<i64> = started.iter().copied().collect();
    let mut terminal_ids = Vec::new();
    terminal_ids.extend(cp.completed.lock().iter().map(|(id, _)| *id));
    terminal_ids.extend(cp.failed.lock().iter().map(|(id, _)| *id));
    let mut seen = HashSet::new();
    for id in terminal_ids {
        assert!(started_set.contains(&id), "terminal report without start");
        assert!(seen.insert(id), "duplicate terminal report for task {}", id);
    }
}

#[tokio::test]
async fn control_plane_cancellation_fails_the_task() {
    let cp = Arc::new(ControlPlane::default());
    cp.offers.lock().push(test_task(5, "doomed"));
    cp.cancel_ids.lock().insert(5);

    let config = Arc::new(agent_config(serve(cp.clone()).await));
    let client = Arc::new(ApiClient::new(&config).unwrap());
    let runtime = Runtime::new(client, config);

    let shutdown = CancellationToken::new();
    let run = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { runtime.run(shutdown).await })
    };

    assert!(
        wait_until(|| !cp.failed.lock().is_empty(), Duration::from_secs(15)).await,
        "task never failed"
    );
    shutdown.cancel();
    run.await.unwrap();

    let failed = cp.failed.lock();
    assert_eq!(failed.len(), 1);
    let (id, body) = &failed[0];
    assert_eq!(*id, 5);
    assert!(body["error"].as_str().unwrap().contains("cancelled"));
    assert!(cp.completed.lock().is_empty());
}
