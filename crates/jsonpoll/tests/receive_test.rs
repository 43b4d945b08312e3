//! Receive channel behavior over HTTP
//!
//! Every test drives the full router with `oneshot` requests against a real
//! session manager.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::*;
use jsonpoll::JsonpConfig;
use pretty_assertions::assert_eq;

fn script(frame: &str) -> String {
    format!("cb({});\r\n", serde_json::to_string(frame).unwrap())
}

#[tokio::test]
async fn test_first_poll_opens_session() {
    let h = harness();

    let reply = poll(&h.app, "s1").await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "cb(\"o\");\r\n");
    assert_eq!(
        reply.headers[header::CONTENT_TYPE],
        "application/javascript; charset=UTF-8"
    );
    assert_eq!(reply.headers[header::CONTENT_LENGTH], "10");
    assert_eq!(reply.headers[header::ETAG], "dummy");
    assert_eq!(
        reply.headers[header::CACHE_CONTROL],
        "no-store, no-cache, no-transform, must-revalidate, max-age=0"
    );
    assert_eq!(*h.recorder.opened.lock(), 1);
    assert_eq!(h.manager.stats().frames_sent, 1);
}

#[tokio::test]
async fn test_missing_callback_creates_no_session() {
    let h = harness();

    let request = Request::get("/s1/jsonp").body(Body::empty()).unwrap();
    let reply = call(&h.app, request).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body, "\"callback\" parameter required");
    assert_eq!(h.manager.session_count(), 0);
}

#[tokio::test]
async fn test_unsafe_callback_rejected() {
    let h = harness();

    let request = Request::get("/s1/jsonp?c=alert(1)")
        .body(Body::empty())
        .unwrap();
    let reply = call(&h.app, request).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.body, "invalid \"callback\" parameter");
    assert_eq!(h.manager.session_count(), 0);
}

#[tokio::test]
async fn test_relaxed_callback_accepted() {
    let h = harness_with(JsonpConfig {
        strict_callback: false,
        ..config()
    });

    let request = Request::get("/s1/jsonp?c=my%20cb")
        .body(Body::empty())
        .unwrap();
    let reply = call(&h.app, request).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, "my cb(\"o\");\r\n");
}

#[tokio::test]
async fn test_invalid_session_id_is_not_found() {
    let h = harness();

    let reply = poll(&h.app, "a.b").await;

    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(h.manager.session_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_idle_poll_gets_heartbeat() {
    let h = harness();
    poll(&h.app, "s1").await;

    let started = tokio::time::Instant::now();
    let reply = poll(&h.app, "s1").await;

    assert_eq!(reply.body, script("h"));
    assert!(started.elapsed() >= Duration::from_secs(25));
    assert!(!h.manager.session("s1").unwrap().is_closed());
}

#[tokio::test]
async fn test_queued_messages_flush_immediately() {
    let h = harness();
    poll(&h.app, "s1").await;

    let sent = post_form(&h.app, "s1", "d=%5B%22a%22%2C%22b%22%5D").await;
    assert_eq!(sent.status, StatusCode::OK);

    let session = h.manager.session("s1").unwrap();
    wait_until(|| session.has_pending()).await;

    let reply = poll(&h.app, "s1").await;
    assert_eq!(reply.body, script(r#"a["a","b"]"#));
    assert!(!session.has_pending());
}

#[tokio::test]
async fn test_waiting_poll_receives_later_message() {
    let h = harness();
    poll(&h.app, "s1").await;

    let app = h.app.clone();
    let waiting = tokio::spawn(async move { poll(&app, "s1").await });

    let session = h.manager.session("s1").unwrap();
    wait_until(|| session.has_receiver()).await;

    post_raw(&h.app, "s1", r#"["late"]"#).await;
    let reply = waiting.await.unwrap();

    assert_eq!(reply.body, script(r#"a["late"]"#));
}

#[tokio::test]
async fn test_second_concurrent_poll_is_refused() {
    let h = harness();
    poll(&h.app, "s1").await;

    let app = h.app.clone();
    let first = tokio::spawn(async move { poll(&app, "s1").await });
    let session = h.manager.session("s1").unwrap();
    wait_until(|| session.has_receiver()).await;

    let second = poll(&h.app, "s1").await;
    assert_eq!(second.body, script(r#"c[2010,"Another connection still open"]"#));
    assert!(!session.is_closed());

    post_raw(&h.app, "s1", r#"["x"]"#).await;
    assert_eq!(first.await.unwrap().body, script(r#"a["x"]"#));
}

#[tokio::test]
async fn test_disconnect_while_waiting_closes_session() {
    let h = harness();
    poll(&h.app, "s1").await;

    let app = h.app.clone();
    let waiting = tokio::spawn(async move { poll(&app, "s1").await });
    let session = h.manager.session("s1").unwrap();
    wait_until(|| session.has_receiver()).await;

    waiting.abort();
    wait_until(|| session.is_closed()).await;
    wait_until(|| *h.recorder.closed.lock() == 1).await;

    let reply = poll(&h.app, "s1").await;
    assert_eq!(reply.body, script(r#"c[1002,"Connection interrupted"]"#));
}

#[tokio::test]
async fn test_cookie_echoed_when_needed() {
    let h = harness_with(JsonpConfig {
        cookie_needed: true,
        ..config()
    });

    let reply = poll(&h.app, "s1").await;
    assert_eq!(reply.headers[header::SET_COOKIE], "JSESSIONID=dummy; Path=/");

    let request = Request::get("/s2/jsonp?c=cb")
        .header(header::COOKIE, "JSESSIONID=node7")
        .body(Body::empty())
        .unwrap();
    let reply = call(&h.app, request).await;
    assert_eq!(reply.headers[header::SET_COOKIE], "JSESSIONID=node7; Path=/");
}

#[tokio::test]
async fn test_routes_nested_under_prefix() {
    let h = harness_with(JsonpConfig {
        prefix: "/echo/".to_string(),
        ..config()
    });

    let request = Request::get("/echo/s1/jsonp?c=cb")
        .body(Body::empty())
        .unwrap();
    assert_eq!(call(&h.app, request).await.body, "cb(\"o\");\r\n");

    assert_eq!(poll(&h.app, "s1").await.status, StatusCode::NOT_FOUND);
}
