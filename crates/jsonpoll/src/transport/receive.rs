//! JSONP receive channel
//!
//! Every `GET /{session_id}/jsonp?c=<callback>` request becomes one
//! [`JsonpReceiver`]. The session writes exactly one frame to it; the frame
//! is delivered as `callback("<frame>");\r\n` so a `<script>` tag can pick
//! it up.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use jsonpoll_traits::{
    AtomicStats, FrameSink, PollingSession, SessionRegistry, TransportError, TransportResult,
};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use super::polling::PollingTransport;
use crate::callback::validate_callback;
use crate::error::JsonpError;
use crate::protocol::json_encode;

/// Content type of receive responses.
pub const JAVASCRIPT: &str = "application/javascript; charset=UTF-8";

const TRANSPORT_NAME: &str = "jsonp";

/// Build the script body for `frame`
///
/// The frame string is JSON-encoded once more so it lands in the callback
/// as a string literal.
pub fn jsonp_body(callback: &str, frame: &str) -> TransportResult<String> {
    Ok(format!("{callback}({});\r\n", json_encode(frame)?))
}

/// The in-flight response of one receive request
pub struct JsonpReceiver {
    callback: String,
    responder: Mutex<Option<oneshot::Sender<Response>>>,
    active: AtomicBool,
    session: Mutex<Option<Weak<dyn PollingSession>>>,
    stats: Arc<AtomicStats>,
}

impl JsonpReceiver {
    /// Create a receiver and the channel its single response arrives on
    pub fn new(
        callback: impl Into<String>,
        stats: Arc<AtomicStats>,
    ) -> (Arc<Self>, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        let receiver = Arc::new(Self {
            callback: callback.into(),
            responder: Mutex::new(Some(tx)),
            active: AtomicBool::new(true),
            session: Mutex::new(None),
            stats,
        });
        (receiver, rx)
    }

    /// Validated callback name
    pub fn callback(&self) -> &str {
        &self.callback
    }

    /// Hand `response` to the waiting request. False when the client is gone.
    fn respond(&self, response: Response) -> bool {
        self.responder
            .lock()
            .take()
            .is_some_and(|tx| tx.send(response).is_ok())
    }

    /// The client went away while the request was still waiting
    fn interrupted(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(session) = self.session() {
            debug!(session_id = session.session_id(), "receive request interrupted");
            self.detach();
            session.interrupted();
        }
    }
}

impl FrameSink for JsonpReceiver {
    fn transport_name(&self) -> &'static str {
        TRANSPORT_NAME
    }

    fn send_pack(&self, message: &str, binary: bool) -> TransportResult<()> {
        if binary {
            return Err(TransportError::BinaryNotSupported(TRANSPORT_NAME));
        }
        if !self.active.swap(false, Ordering::AcqRel) {
            return Err(TransportError::Inactive);
        }

        let body = jsonp_body(&self.callback, message)?;
        let len = body.len();

        let mut response = body.into_response();
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JAVASCRIPT));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        headers.insert(header::ETAG, HeaderValue::from_static("dummy"));

        if self.respond(response) {
            trace!(frame = message, "jsonp frame written");
            self.stats.record_frame(len);
        } else {
            self.stats.write_failures.fetch_add(1, Ordering::Relaxed);
            if let Some(session) = self.session() {
                debug!(session_id = session.session_id(), "jsonp client went away");
                session.interrupted();
            }
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn session_not_found(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            self.respond(JsonpError::SessionNotFound.into_response());
        }
    }

    fn attach(&self, session: Weak<dyn PollingSession>) {
        *self.session.lock() = Some(session);
    }

    fn detach(&self) {
        self.session.lock().take();
    }

    fn session(&self) -> Option<Arc<dyn PollingSession>> {
        self.session.lock().as_ref().and_then(Weak::upgrade)
    }
}

impl fmt::Debug for JsonpReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonpReceiver")
            .field("callback", &self.callback)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Closes the session when the request future is dropped mid-wait.
struct InterruptGuard(Arc<JsonpReceiver>);

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.0.interrupted();
    }
}

/// Query of a receive request
#[derive(Debug, Deserialize)]
pub struct ReceiveQuery {
    /// Callback name
    c: Option<String>,
}

/// `GET /{session_id}/jsonp`
pub async fn jsonp_receive<T: PollingTransport>(
    State(transport): State<T>,
    Path(session_id): Path<String>,
    Query(query): Query<ReceiveQuery>,
    headers: HeaderMap,
) -> Response {
    let mut common = HeaderMap::new();
    transport.handle_session_cookie(&headers, &mut common);
    transport.disable_cache(&mut common);

    let callback = match validate_callback(query.c.as_deref(), transport.config().strict_callback)
    {
        Ok(callback) => callback.to_string(),
        Err(err) => {
            debug!(%session_id, error = %err, "receive request rejected");
            return with_headers(err.into_response(), common);
        }
    };

    let (receiver, rx) = JsonpReceiver::new(callback, transport.stats().clone());
    let guard = InterruptGuard(receiver.clone());

    let attached = transport
        .registry()
        .attach_session(&session_id, receiver.clone(), false)
        .await;

    if attached && let Some(session) = receiver.session() {
        if session.has_pending() {
            session.flush();
        } else {
            session.start_heartbeat();
        }
    }

    let response = rx
        .await
        .unwrap_or_else(|_| JsonpError::SessionNotFound.into_response());
    drop(guard);
    with_headers(response, common)
}

fn with_headers(mut response: Response, common: HeaderMap) -> Response {
    response.headers_mut().extend(common);
    response
}
