//! In-process harness shared by the API test files.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use study_desk_engine::{Clock, ReviewScheduler};
use study_desk_schemas::{Message, Note};
use study_desk_server::{router, AppState, ChatCompletion, Database};
use tempfile::NamedTempFile;
use tower::ServiceExt;

pub const BOUNDARY: &str = "study-desk-test-boundary";

/// Replays queued replies in order and records every request.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlm {
    pub fn push(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(reply.to_string());
    }

    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for ScriptedLlm {
    async fn complete(&self, messages: &[Message], _temperature: f32) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        // Give concurrent requests a chance to interleave, as a network call would
        tokio::task::yield_now().await;
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted reply left"))
    }
}

/// A clock the test moves by hand.
pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

pub struct TestApp {
    pub app: Router,
    pub llm: Arc<ScriptedLlm>,
    pub clock: Arc<ManualClock>,
    _db_file: NamedTempFile,
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap()
}

pub fn test_app() -> TestApp {
    let db_file = NamedTempFile::new().unwrap();
    let db = Database::new(db_file.path()).unwrap();
    let llm = Arc::new(ScriptedLlm::default());
    let clock = Arc::new(ManualClock(Mutex::new(start())));

    let state = AppState::new(db, llm.clone(), ReviewScheduler::with_clock(clock.clone()));

    TestApp {
        app: router(state),
        llm,
        clock,
        _db_file: db_file,
    }
}

impl TestApp {
    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.request(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send("GET", uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send("DELETE", uri, None).await
    }

    /// POST a multipart form built by [`multipart_body`].
    pub async fn upload(&self, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.request(request).await
    }

    pub async fn create_note(&self, user_id: &str, title: &str) -> Note {
        let (status, body) = self
            .post(
                "/api/v1/notes",
                json!({ "userId": user_id, "title": title, "content": "notes body" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_value(body).unwrap()
    }
}

/// A multipart form with text `fields` and one file part.
pub fn multipart_body(
    file_field: &str,
    file_name: &str,
    file: &[u8],
    fields: &[(&str, &str)],
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            BOUNDARY, file_field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn ids(items: &Value) -> Vec<String> {
    items
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap().to_string())
        .collect()
}
