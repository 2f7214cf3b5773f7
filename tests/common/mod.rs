//! In-process stand-in for the Parcl Labs API.
#![allow(dead_code)]

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const API_KEY: &str = "test-key";

/// Canned response for one market's history endpoint
#[derive(Clone)]
pub enum History {
    Ok(Value),
    Status(u16),
    /// Fail with 503 for the first `n` calls, then answer with the payload
    FlakyThenOk(usize, Value),
    Slow(Duration, Value),
}

pub struct Provider {
    markets: Value,
    histories: HashMap<u64, History>,
    calls: HashMap<u64, AtomicUsize>,
}

impl Provider {
    pub fn new(markets: Value) -> Self {
        Self {
            markets,
            histories: HashMap::new(),
            calls: HashMap::new(),
        }
    }

    pub fn history(mut self, parcl_id: u64, history: History) -> Self {
        self.histories.insert(parcl_id, history);
        self.calls.insert(parcl_id, AtomicUsize::new(0));
        self
    }

    pub fn calls(&self, parcl_id: u64) -> usize {
        self.calls
            .get(&parcl_id)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == API_KEY)
        .unwrap_or(false)
}

async fn markets(State(provider): State<Arc<Provider>>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    Json(provider.markets.clone()).into_response()
}

async fn history(
    State(provider): State<Arc<Provider>>,
    Path(parcl_id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    let call = provider
        .calls
        .get(&parcl_id)
        .map(|c| c.fetch_add(1, Ordering::SeqCst))
        .unwrap_or(0);

    match provider.histories.get(&parcl_id) {
        Some(History::Ok(body)) => Json(body.clone()).into_response(),
        Some(History::Status(code)) => {
            let status = StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, "provider error").into_response()
        }
        Some(History::FlakyThenOk(failures, body)) => {
            if call < *failures {
                (StatusCode::SERVICE_UNAVAILABLE, "try later").into_response()
            } else {
                Json(body.clone()).into_response()
            }
        }
        Some(History::Slow(delay, body)) => {
            tokio::time::sleep(*delay).await;
            Json(body.clone()).into_response()
        }
        None => (StatusCode::NOT_FOUND, json!({"detail": "unknown parcl_id"}).to_string())
            .into_response(),
    }
}

/// Serve the provider on an ephemeral port; returns its base URL
pub async fn spawn(provider: Arc<Provider>) -> String {
    let app = Router::new()
        .route("/v1/place/markets", get(markets))
        .route("/v1/financials/:parcl_id/history", get(history))
        .with_state(provider);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1")
}

pub fn springfield_catalog() -> Value {
    json!([
        {"parcl_id": 1, "name": "Springfield City", "state": "IL"},
        {"parcl_id": 2, "name": "Shelbyville", "state": "IL"}
    ])
}
