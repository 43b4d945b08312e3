//! In-memory polling session
//!
//! A [`Session`] outlives many HTTP requests. It owns the ordered send
//! queue, the heartbeat timer and the close state; polling transports only
//! reach it through the [`PollingSession`] surface.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::Duration;

use jsonpoll_traits::{
    AtomicStats, BoxFuture, FrameSink, MessageBatch, PollingSession, TransportError,
    TransportResult,
};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::config::JsonpConfig;
use crate::handler::{Connection, MessageHandler};
use crate::protocol::{CloseReason, HEARTBEAT_FRAME, OPEN_FRAME, json_encode, message_frame};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, open frame not yet delivered
    Connecting,
    /// Open frame delivered, messages flow
    Open,
    /// Close requested, `on_close` pending
    Closing,
    /// Terminal
    Closed,
}

/// Timing settings shared by all sessions of a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Delay before an idle receive channel gets a heartbeat frame
    pub heartbeat_interval: Duration,
    /// How long a session may stay without a receive channel
    pub disconnect_delay: Duration,
}

impl From<&JsonpConfig> for SessionSettings {
    fn from(config: &JsonpConfig) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval,
            disconnect_delay: config.disconnect_delay,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&JsonpConfig::default())
    }
}

struct SessionInner {
    state: SessionState,
    send_queue: Vec<String>,
    sink: Option<Arc<dyn FrameSink>>,
    heartbeat: Option<JoinHandle<()>>,
    heartbeat_seq: u64,
    pending_flush: bool,
    last_activity: Instant,
    close_reason: CloseReason,
}

/// Server-side state of one logical client connection
pub struct Session {
    id: Arc<str>,
    me: Weak<Session>,
    inner: Mutex<SessionInner>,
    handler: Arc<dyn MessageHandler>,
    settings: SessionSettings,
    stats: Arc<AtomicStats>,
}

impl Session {
    /// Create a session in the `Connecting` state
    pub fn new(
        id: impl Into<Arc<str>>,
        handler: Arc<dyn MessageHandler>,
        settings: SessionSettings,
        stats: Arc<AtomicStats>,
    ) -> Arc<Self> {
        let id = id.into();
        Arc::new_cyclic(|me| Self {
            id,
            me: me.clone(),
            inner: Mutex::new(SessionInner {
                state: SessionState::Connecting,
                send_queue: Vec::new(),
                sink: None,
                heartbeat: None,
                heartbeat_seq: 0,
                pending_flush: false,
                last_activity: Instant::now(),
                close_reason: CloseReason::default(),
            }),
            handler,
            settings,
            stats,
        })
    }

    /// Session identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    /// Whether close was requested (closing or closed)
    pub fn is_closed(&self) -> bool {
        matches!(
            self.inner.lock().state,
            SessionState::Closing | SessionState::Closed
        )
    }

    /// Whether messages are queued for delivery
    pub fn has_pending(&self) -> bool {
        !self.inner.lock().send_queue.is_empty()
    }

    /// Whether a receive channel is attached
    pub fn has_receiver(&self) -> bool {
        self.inner.lock().sink.is_some()
    }

    /// Handle for application code
    pub fn connection(&self) -> Connection {
        Connection::new(self.id.clone(), self.me.clone())
    }

    /// Attach `sink` as the receive channel
    ///
    /// Refuses (and answers through `sink`) when another active receive
    /// channel is attached, or when the session is closed with nothing left
    /// to deliver.
    pub fn set_handler(&self, sink: Arc<dyn FrameSink>, start_heartbeat: bool) -> bool {
        let mut inner = self.inner.lock();

        if let Some(current) = inner.sink.take() {
            if current.is_active() {
                inner.sink = Some(current);
                debug!(session_id = %self.id, "refusing second receive channel");
                deliver(&*sink, &CloseReason::ANOTHER_CONNECTION.frame());
                return false;
            }
            current.detach();
        }

        if matches!(inner.state, SessionState::Closing | SessionState::Closed)
            && inner.send_queue.is_empty()
        {
            deliver(&*sink, &inner.close_reason.frame());
            return false;
        }

        let weak: Weak<dyn PollingSession> = self.me.clone();
        sink.attach(weak);
        inner.sink = Some(sink);
        inner.last_activity = Instant::now();

        if start_heartbeat {
            self.schedule_heartbeat(&mut inner);
        }
        true
    }

    /// Open a freshly created session
    ///
    /// Sends the open frame through the attached receive channel and runs
    /// the application's `on_open` hook. No-op for sessions already open.
    pub async fn verify_state(&self) {
        let opened = {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Connecting {
                inner.state = SessionState::Open;
                self.send_frame(&mut inner, OPEN_FRAME);
                true
            } else {
                false
            }
        };

        if opened {
            debug!(session_id = %self.id, "session opened");
            self.handler.on_open(&self.connection()).await;
        }
    }

    /// Queue a message for the client
    ///
    /// Messages queued in the same scheduler tick go out in one frame.
    ///
    /// # Errors
    ///
    /// Fails when the session is closing or the value cannot be encoded.
    pub fn send_message<T: Serialize + ?Sized>(&self, message: &T) -> TransportResult<()> {
        let encoded = json_encode(message)?;

        let mut inner = self.inner.lock();
        if matches!(inner.state, SessionState::Closing | SessionState::Closed) {
            return Err(TransportError::SessionClosed(self.id.to_string()));
        }
        inner.send_queue.push(encoded);

        if !inner.pending_flush {
            inner.pending_flush = true;
            let session = self.me.clone();
            tokio::spawn(async move {
                if let Some(session) = session.upgrade() {
                    session.flush();
                }
            });
        }
        Ok(())
    }

    /// Deliver the whole send queue as one message frame
    pub fn flush(&self) {
        let mut inner = self.inner.lock();
        inner.pending_flush = false;

        let active = inner.sink.as_ref().is_some_and(|sink| sink.is_active());
        if !active || inner.send_queue.is_empty() {
            return;
        }

        let frame = message_frame(&inner.send_queue);
        inner.send_queue.clear();
        self.send_frame(&mut inner, &frame);
    }

    /// Schedule a heartbeat frame on the attached receive channel
    pub fn start_heartbeat(&self) {
        let mut inner = self.inner.lock();
        if inner.sink.as_ref().is_some_and(|sink| sink.is_active()) {
            self.schedule_heartbeat(&mut inner);
        }
    }

    /// Hand a decoded client batch to the application, message by message
    ///
    /// # Errors
    ///
    /// [`TransportError::HandlerFailed`] with the first handler error;
    /// remaining messages of the batch are not dispatched.
    pub async fn on_messages(&self, batch: MessageBatch) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::SessionClosed(self.id.to_string()));
        }

        let conn = self.connection();
        for message in batch.into_messages() {
            self.stats.messages_received.fetch_add(1, Ordering::Relaxed);
            self.handler
                .on_message(&conn, message)
                .await
                .map_err(|e| TransportError::handler(format!("{e:#}")))?;
        }
        Ok(())
    }

    /// Close with the default reason
    pub fn close(&self) {
        self.close_with(CloseReason::default());
    }

    /// Close the session
    ///
    /// Idempotent. An attached receive channel gets the close frame; the
    /// application's `on_close` hook runs on a spawned task.
    pub fn close_with(&self, reason: CloseReason) {
        let was_open = {
            let mut inner = self.inner.lock();
            if matches!(inner.state, SessionState::Closing | SessionState::Closed) {
                return;
            }
            let was_open = inner.state == SessionState::Open;
            inner.state = SessionState::Closing;
            inner.close_reason = reason;

            let frame = inner.close_reason.frame();
            self.send_frame(&mut inner, &frame);
            cancel_heartbeat(&mut inner);
            was_open
        };

        self.stats.sessions_closed.fetch_add(1, Ordering::Relaxed);
        debug!(session_id = %self.id, "session closing");

        let Some(session) = self.me.upgrade() else {
            self.inner.lock().state = SessionState::Closed;
            return;
        };
        tokio::spawn(async move {
            if was_open {
                session.handler.on_close(&session.connection()).await;
            }
            session.inner.lock().state = SessionState::Closed;
        });
    }

    /// Close on a later scheduler tick
    pub fn delayed_close(&self) {
        self.delayed_close_with(CloseReason::default());
    }

    /// Close with `reason` on a later scheduler tick
    pub fn delayed_close_with(&self, reason: CloseReason) {
        if let Some(session) = self.me.upgrade() {
            tokio::spawn(async move {
                session.close_with(reason);
            });
        }
    }

    /// Whether the session went without a receive channel for longer than
    /// the disconnect delay
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        let inner = self.inner.lock();
        inner.sink.is_none()
            && now.saturating_duration_since(inner.last_activity) >= self.settings.disconnect_delay
    }

    fn schedule_heartbeat(&self, inner: &mut SessionInner) {
        cancel_heartbeat(inner);
        inner.heartbeat_seq = inner.heartbeat_seq.wrapping_add(1);

        let seq = inner.heartbeat_seq;
        let session = self.me.clone();
        let interval = self.settings.heartbeat_interval;
        inner.heartbeat = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            if let Some(session) = session.upgrade() {
                session.send_heartbeat(seq);
            }
        }));
    }

    fn send_heartbeat(&self, seq: u64) {
        let mut inner = self.inner.lock();
        if inner.heartbeat_seq != seq || inner.heartbeat.is_none() {
            return;
        }
        // This task is the heartbeat; drop the handle instead of aborting it.
        inner.heartbeat = None;
        self.send_frame(&mut inner, HEARTBEAT_FRAME);
    }

    /// Write `frame` to the attached receive channel and detach it
    ///
    /// Polling channels carry exactly one frame per HTTP response.
    fn send_frame(&self, inner: &mut SessionInner, frame: &str) -> bool {
        let Some(sink) = inner.sink.take() else {
            return false;
        };
        cancel_heartbeat(inner);
        inner.last_activity = Instant::now();

        let delivered = sink.is_active() && deliver(&*sink, frame);
        sink.detach();
        delivered
    }
}

fn cancel_heartbeat(inner: &mut SessionInner) {
    if let Some(heartbeat) = inner.heartbeat.take() {
        heartbeat.abort();
    }
}

fn deliver(sink: &dyn FrameSink, frame: &str) -> bool {
    match sink.send_pack(frame, false) {
        Ok(()) => true,
        Err(err) if err.is_fatal() => {
            error!(transport = sink.transport_name(), error = %err, "frame rejected by transport");
            false
        }
        Err(err) => {
            warn!(transport = sink.transport_name(), error = %err, "frame not delivered");
            false
        }
    }
}

impl PollingSession for Session {
    fn session_id(&self) -> &str {
        &self.id
    }

    fn has_pending(&self) -> bool {
        Session::has_pending(self)
    }

    fn is_closed(&self) -> bool {
        Session::is_closed(self)
    }

    fn start_heartbeat(&self) {
        Session::start_heartbeat(self);
    }

    fn flush(&self) {
        Session::flush(self);
    }

    fn on_messages(&self, batch: MessageBatch) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(Session::on_messages(self, batch))
    }

    fn close(&self) {
        Session::close(self);
    }

    fn delayed_close(&self) {
        Session::delayed_close(self);
    }

    fn interrupted(&self) {
        Session::delayed_close_with(self, CloseReason::INTERRUPTED);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("queued", &inner.send_queue.len())
            .field("receiver", &inner.sink.is_some())
            .finish()
    }
}
