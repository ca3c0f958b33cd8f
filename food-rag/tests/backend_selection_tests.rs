//! Backend selection, including the fail-closed fallback for missing Upstash
//! credentials.

use std::collections::HashMap;
use std::time::Duration;

use food_rag::{AppConfig, BackendKind, BackendSelection, open_vector_store, select_backend};

fn config(vars: &[(&str, &str)]) -> AppConfig {
    let mut map: HashMap<String, String> =
        vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    map.entry("OPENAI_API_KEY".to_string()).or_insert_with(|| "sk-test".to_string());
    AppConfig::from_lookup(move |key| map.get(key).cloned()).unwrap()
}

#[test]
fn default_is_in_memory() {
    let selection = select_backend(&config(&[]));
    assert_eq!(selection, BackendSelection::InMemory { snapshot_path: None });
}

#[test]
fn remote_without_credentials_falls_back_to_in_memory() {
    for vars in [
        vec![("VECTOR_DB_TYPE", "remote-managed")],
        vec![("VECTOR_DB_TYPE", "remote-managed"), ("UPSTASH_VECTOR_REST_URL", "https://x.upstash.io")],
        vec![("VECTOR_DB_TYPE", "upstash"), ("UPSTASH_VECTOR_REST_TOKEN", "token")],
        vec![("VECTOR_DB_TYPE", "remote"), ("UPSTASH_VECTOR_REST_URL", "  "), ("UPSTASH_VECTOR_REST_TOKEN", "t")],
    ] {
        let cfg = config(&vars);
        assert_eq!(cfg.backend, BackendKind::RemoteManaged);
        assert_eq!(select_backend(&cfg).kind(), BackendKind::InMemory, "vars: {vars:?}");
    }
}

#[test]
fn fallback_keeps_the_snapshot_path() {
    let cfg = config(&[("VECTOR_DB_TYPE", "remote-managed"), ("VECTOR_SNAPSHOT_PATH", "/tmp/store.json")]);
    assert_eq!(
        select_backend(&cfg),
        BackendSelection::InMemory { snapshot_path: Some("/tmp/store.json".into()) }
    );
}

#[test]
fn remote_with_credentials_selects_upstash() {
    let cfg = config(&[
        ("VECTOR_DB_TYPE", "remote-managed"),
        ("UPSTASH_VECTOR_REST_URL", "https://x.upstash.io"),
        ("UPSTASH_VECTOR_REST_TOKEN", "token"),
        ("EMBEDDING_DIMENSIONS", "384"),
        ("RETRY_MAX_ATTEMPTS", "5"),
    ]);
    match select_backend(&cfg) {
        BackendSelection::RemoteManaged { url, token, dimensions, retry } => {
            assert_eq!(url, "https://x.upstash.io");
            assert_eq!(token, "token");
            assert_eq!(dimensions, 384);
            assert_eq!(retry.max_attempts, 5);
        }
        other => panic!("unexpected selection: {other:?}"),
    }
}

#[test]
fn local_server_carries_qdrant_settings() {
    let cfg = config(&[
        ("VECTOR_DB_TYPE", "local-server"),
        ("QDRANT_URL", "http://qdrant:6334"),
        ("QDRANT_COLLECTION", "dishes"),
        ("OPERATION_TIMEOUT_MS", "2000"),
    ]);
    match select_backend(&cfg) {
        BackendSelection::LocalServer { url, api_key, collection, dimensions, retry } => {
            assert_eq!(url, "http://qdrant:6334");
            assert_eq!(api_key, None);
            assert_eq!(collection, "dishes");
            assert_eq!(dimensions, 1536);
            assert_eq!(retry.deadline, Some(Duration::from_secs(2)));
        }
        other => panic!("unexpected selection: {other:?}"),
    }
}

#[tokio::test]
async fn fallback_store_opens_without_network() {
    let cfg = config(&[("VECTOR_DB_TYPE", "remote-managed")]);
    let store = open_vector_store(&cfg).await.unwrap();
    assert_eq!(store.name(), "in-memory");
    assert!(store.get_existing_ids().await.unwrap().is_empty());
    assert!(store.query(&[1.0, 0.0], 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_upstash_fails_to_open() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{addr}");
    let cfg = config(&[
        ("VECTOR_DB_TYPE", "remote-managed"),
        ("UPSTASH_VECTOR_REST_URL", url.as_str()),
        ("UPSTASH_VECTOR_REST_TOKEN", "token"),
    ]);
    let err = open_vector_store(&cfg).await.err().unwrap();
    assert!(matches!(err, food_rag::RagError::InitializationFailed { .. }));
}
