//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct MockKey {
    pub id: String,
    pub name: String,
    pub limit: Option<u64>,
}

#[derive(Debug, Default)]
struct MockState {
    keys: Vec<MockKey>,
    usage: HashMap<String, u64>,
    next_id: u64,
    fail_create: bool,
    fail_metrics: bool,
    metrics_delay: Duration,
}

/// A mock Outline management API on an ephemeral port.
#[derive(Clone)]
pub struct MockOutline {
    pub address: String,
    state: Arc<Mutex<MockState>>,
}

impl MockOutline {
    pub fn keys(&self) -> Vec<MockKey> {
        self.state.lock().unwrap().keys.clone()
    }

    pub fn add_key(&self, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id.to_string();
        state.keys.push(MockKey { id: id.clone(), name: name.to_string(), limit: None });
        id
    }

    pub fn set_usage(&self, id: &str, bytes: u64) {
        self.state.lock().unwrap().usage.insert(id.to_string(), bytes);
    }

    pub fn fail_create(&self, fail: bool) {
        self.state.lock().unwrap().fail_create = fail;
    }

    pub fn fail_metrics(&self, fail: bool) {
        self.state.lock().unwrap().fail_metrics = fail;
    }

    /// Hold every transfer metrics response for `delay`.
    pub fn delay_metrics(&self, delay: Duration) {
        self.state.lock().unwrap().metrics_delay = delay;
    }
}

fn access_url(id: &str) -> String {
    format!("ss://Y2hhY2hhMjA6{}@127.0.0.1:443/?outline=1", id)
}

fn key_json(key: &MockKey) -> Value {
    json!({
        "id": key.id,
        "name": key.name,
        "password": "secret",
        "port": 443,
        "method": "chacha20-ietf-poly1305",
        "accessUrl": access_url(&key.id),
    })
}

type Shared = Arc<Mutex<MockState>>;

async fn list_keys(State(state): State<Shared>) -> Json<Value> {
    let state = state.lock().unwrap();
    let keys: Vec<Value> = state.keys.iter().map(key_json).collect();
    Json(json!({ "accessKeys": keys }))
}

async fn create_key(State(state): State<Shared>) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let mut state = state.lock().unwrap();
    if state.fail_create {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    state.next_id += 1;
    let key = MockKey { id: state.next_id.to_string(), name: String::new(), limit: None };
    let body = key_json(&key);
    state.keys.push(key);
    Ok((StatusCode::CREATED, Json(body)))
}

async fn rename_key(
    State(state): State<Shared>,
    UrlPath(id): UrlPath<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    match state.keys.iter_mut().find(|k| k.id == id) {
        Some(key) => {
            key.name = body["name"].as_str().unwrap_or_default().to_string();
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn limit_key(
    State(state): State<Shared>,
    UrlPath(id): UrlPath<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    match state.keys.iter_mut().find(|k| k.id == id) {
        Some(key) => {
            key.limit = body["limit"]["bytes"].as_u64();
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn delete_key(State(state): State<Shared>, UrlPath(id): UrlPath<String>) -> StatusCode {
    let mut state = state.lock().unwrap();
    let before = state.keys.len();
    state.keys.retain(|k| k.id != id);
    if state.keys.len() < before {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn transfer(State(state): State<Shared>) -> Result<Json<Value>, StatusCode> {
    let delay = state.lock().unwrap().metrics_delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let state = state.lock().unwrap();
    if state.fail_metrics {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(json!({ "bytesTransferredByUserId": state.usage })))
}

/// Start a mock Outline server. Its address includes a secret path prefix
/// the way real management URLs do.
pub async fn start_mock_outline() -> MockOutline {
    let state: Shared = Arc::new(Mutex::new(MockState::default()));

    let api = Router::new()
        .route("/access-keys", get(list_keys).post(create_key))
        .route("/access-keys/{id}", axum::routing::delete(delete_key))
        .route("/access-keys/{id}/name", put(rename_key))
        .route("/access-keys/{id}/data-limit", put(limit_key))
        .route("/metrics/transfer", get(transfer))
        .with_state(state.clone());
    let app = Router::new().nest("/secret", api);

    let addr = serve(app).await;
    MockOutline {
        address: format!("http://{}/secret", addr),
        state,
    }
}

/// Serve a router on an ephemeral port and return its address.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// An address nothing listens on.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/secret", addr)
}

/// Write a servers file to a unique temp path.
pub fn servers_file(servers: &[&str]) -> PathBuf {
    let path = std::env::temp_dir().join(format!("servers-{}.json", uuid::Uuid::new_v4()));
    write_servers(&path, servers);
    path
}

pub fn write_servers(path: &Path, servers: &[&str]) {
    std::fs::write(path, json!({ "servers": servers }).to_string()).unwrap();
}

/// Poll `check` until it returns true or `timeout` passes.
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
