//! HTTP contract of the food-rag server.

mod common;

use std::path::PathBuf;
use std::sync::Arc;

use common::{Harness, ScriptedModel, harness, sample_foods};
use food_rag::{AppState, ServerConfig, VectorStore, app_router, bind_listener};
use serde_json::{Value, json};

async fn spawn_server(model: ScriptedModel, data_path: PathBuf) -> (String, tokio::task::JoinHandle<()>) {
    spawn_with(harness(model, 2).await, data_path).await
}

async fn spawn_with(h: Harness, data_path: PathBuf) -> (String, tokio::task::JoinHandle<()>) {
    let state = AppState { service: Arc::new(h.service), data_path };
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{addr}"), handle)
}

fn write_dataset(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("foods.json");
    std::fs::write(&path, serde_json::to_vec(&sample_foods()).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn health_reports_the_backend() {
    let (base, handle) = spawn_server(ScriptedModel::default(), PathBuf::from("unused.json")).await;

    let body: Value = reqwest::get(format!("{base}/health")).await.unwrap().json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "in-memory");

    handle.abort();
}

#[tokio::test]
async fn load_list_and_ask() {
    let dir = tempfile::tempdir().unwrap();
    let (base, handle) = spawn_server(ScriptedModel::default(), write_dataset(&dir)).await;
    let client = reqwest::Client::new();

    let load = client.post(format!("{base}/api/load")).send().await.unwrap();
    assert_eq!(load.status(), 200);
    let report: Value = load.json().await.unwrap();
    assert_eq!(report, json!({ "total": 3, "added": 3, "skipped": 0 }));

    let again: Value =
        client.post(format!("{base}/api/load")).send().await.unwrap().json().await.unwrap();
    assert_eq!(again["skipped"], 3);

    let forced: Value = client
        .post(format!("{base}/api/load?force=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(forced["added"], 3);

    let docs: Value =
        client.get(format!("{base}/api/documents")).send().await.unwrap().json().await.unwrap();
    assert_eq!(docs["count"], 3);

    let ask = client
        .post(format!("{base}/api/ask"))
        .json(&json!({ "question": "Which soup has noodles?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(ask.status(), 200);
    let answer: Value = ask.json().await.unwrap();
    assert_eq!(answer["answer"], "Pho is the noodle soup.");
    assert_eq!(answer["sources"].as_array().unwrap().len(), 2);
    assert_eq!(answer["sources"][0]["id"], "1");

    handle.abort();
}

#[tokio::test]
async fn empty_question_is_a_bad_request() {
    let (base, handle) = spawn_server(ScriptedModel::default(), PathBuf::from("unused.json")).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/ask"))
        .json(&json!({ "question": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("question"));

    handle.abort();
}

#[tokio::test]
async fn model_failure_is_a_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let (base, handle) = spawn_server(ScriptedModel::failing(), write_dataset(&dir)).await;
    let client = reqwest::Client::new();

    client.post(format!("{base}/api/load")).send().await.unwrap();
    let response = client
        .post(format!("{base}/api/ask"))
        .json(&json!({ "question": "Which soup has noodles?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);

    handle.abort();
}

#[tokio::test]
async fn missing_dataset_is_a_server_error() {
    let dir = tempfile::tempdir().unwrap();
    let (base, handle) =
        spawn_server(ScriptedModel::default(), dir.path().join("missing.json")).await;

    let response = reqwest::Client::new().post(format!("{base}/api/load")).send().await.unwrap();
    assert_eq!(response.status(), 500);

    handle.abort();
}

#[tokio::test]
async fn embedder_and_store_disagreeing_is_a_server_error() {
    let h = harness(ScriptedModel::default(), 2).await;
    // Two-dimensional record; the keyword embedder produces four dimensions.
    h.store
        .add_documents(&["stale".to_string()], &[vec![1.0, 0.0]], &["old".to_string()])
        .await
        .unwrap();
    let (base, handle) = spawn_with(h, PathBuf::from("unused.json")).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/ask"))
        .json(&json!({ "question": "Which soup has noodles?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Dimension mismatch"));

    handle.abort();
}

#[tokio::test]
async fn listener_binds_host_names() {
    let config = ServerConfig { host: "localhost".to_string(), port: 0 };
    let listener = bind_listener(&config).await.unwrap();
    assert!(listener.local_addr().unwrap().ip().is_loopback());
}
