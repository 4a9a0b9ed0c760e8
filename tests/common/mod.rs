#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;
use webhook_receiver::{
    ids::SequentialIds, time::FixedClock, Receiver, StorageError, StorageSink,
};

pub const FIXED_TIMESTAMP: &str = "2024-05-01T10:00:00.000000Z";
pub const FIRST_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Keeps every put in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySink {
    pub fn get(&self, key: &str) -> Option<Value> {
        let records = self.records.lock().unwrap();
        records.get(key).map(|b| serde_json::from_slice(b).unwrap())
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.records.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageSink for MemorySink {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(key) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        records.insert(key.to_string(), bytes);
        Ok(())
    }
}

/// Rejects every write the way a read-only volume would.
#[derive(Default)]
pub struct FailingSink {
    pub attempts: Mutex<usize>,
}

#[async_trait]
impl StorageSink for FailingSink {
    async fn put(&self, key: &str, _bytes: Vec<u8>) -> Result<(), StorageError> {
        *self.attempts.lock().unwrap() += 1;
        Err(StorageError::Io {
            path: key.into(),
            source: std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only file system",
            ),
        })
    }
}

/// Blows up mid-write.
#[derive(Default)]
pub struct PanickingSink;

#[async_trait]
impl StorageSink for PanickingSink {
    async fn put(&self, _key: &str, _bytes: Vec<u8>) -> Result<(), StorageError> {
        panic!("storage backend exploded");
    }
}

/// Receiver pinned to [`FIXED_TIMESTAMP`] and sequential ids.
pub fn deterministic(sink: Arc<dyn StorageSink>) -> Receiver {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
    Receiver::new(sink)
        .with_clock(Arc::new(FixedClock(at)))
        .with_ids(Arc::new(SequentialIds::new()))
}

pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_webhook(app: Router, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/freshdesk")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    send(app, request).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("failed to make request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
