//! Shared fixtures for the HTTP tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use jsonpoll::{Connection, JsonpConfig, MessageHandler, SessionManager, app};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tower::ServiceExt; // For oneshot

/// Records every message and echoes it back; fails on the string "fail".
#[derive(Debug, Default)]
pub struct Recorder {
    pub messages: Mutex<Vec<Value>>,
    pub opened: Mutex<u32>,
    pub closed: Mutex<u32>,
}

#[async_trait::async_trait]
impl MessageHandler for Recorder {
    async fn on_open(&self, _conn: &Connection) {
        *self.opened.lock() += 1;
    }

    async fn on_message(&self, conn: &Connection, message: Value) -> anyhow::Result<()> {
        if message == json!("fail") {
            anyhow::bail!("handler refused the message");
        }
        self.messages.lock().push(message.clone());
        conn.send(&message)?;
        Ok(())
    }

    async fn on_close(&self, _conn: &Connection) {
        *self.closed.lock() += 1;
    }
}

pub struct Harness {
    pub app: Router,
    pub manager: Arc<SessionManager>,
    pub recorder: Arc<Recorder>,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

pub fn config() -> JsonpConfig {
    JsonpConfig::builder()
        .prefix("")
        .heartbeat_interval(Duration::from_secs(25))
        .disconnect_delay(Duration::from_secs(5))
        .gc_interval(Duration::from_secs(1))
        .build()
}

pub fn harness() -> Harness {
    harness_with(config())
}

pub fn harness_with(config: JsonpConfig) -> Harness {
    let recorder = Arc::new(Recorder::default());
    let manager = SessionManager::new(recorder.clone(), &config);
    let app = app(manager.clone(), Arc::new(config));
    Harness {
        app,
        manager,
        recorder,
    }
}

pub async fn call(app: &Router, request: Request<Body>) -> Reply {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    Reply {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

pub fn poll_request(session_id: &str) -> Request<Body> {
    Request::get(format!("/{session_id}/jsonp?c=cb"))
        .body(Body::empty())
        .unwrap()
}

pub async fn poll(app: &Router, session_id: &str) -> Reply {
    call(app, poll_request(session_id)).await
}

pub async fn post_form(app: &Router, session_id: &str, body: &str) -> Reply {
    let request = Request::post(format!("/{session_id}/jsonp_send"))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    call(app, request).await
}

pub async fn post_raw(app: &Router, session_id: &str, body: &str) -> Reply {
    let request = Request::post(format!("/{session_id}/jsonp_send"))
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(body.to_string()))
        .unwrap();
    call(app, request).await
}

/// Yield until `ready` holds, failing after a bounded number of turns.
pub async fn wait_until(mut ready: impl FnMut() -> bool) {
    for _ in 0..100 {
        if ready() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
