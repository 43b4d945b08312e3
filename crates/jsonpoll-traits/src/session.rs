//! Session and registry abstractions consumed by polling transports.

use std::fmt;
use std::sync::Arc;

use crate::BoxFuture;
use crate::error::TransportResult;
use crate::message::MessageBatch;
use crate::sink::FrameSink;

/// The narrow surface a polling transport uses to drive a session.
///
/// A session owns its send queue and closed flag. Transports never touch
/// that state directly; every interaction goes through these methods, so
/// implementations are free to serialize access however they like.
pub trait PollingSession: Send + Sync + fmt::Debug {
    /// Identifier that is stable for the lifetime of the logical connection.
    fn session_id(&self) -> &str;

    /// Whether outbound messages are waiting in the send queue.
    fn has_pending(&self) -> bool;

    /// Whether the session reached its terminal state.
    fn is_closed(&self) -> bool;

    /// Schedule a keep-alive frame on the attached sink.
    fn start_heartbeat(&self);

    /// Deliver every queued message through the attached sink, if any.
    fn flush(&self);

    /// Hand a decoded client batch to the application.
    ///
    /// An `Err` means the application failed while processing the batch.
    fn on_messages(&self, batch: MessageBatch) -> BoxFuture<'_, TransportResult<()>>;

    /// Close the session immediately.
    fn close(&self);

    /// Close the session on a later scheduler tick instead of inline.
    fn delayed_close(&self);

    /// The attached receive channel lost its client mid-request.
    ///
    /// Closes on a later scheduler tick like [`delayed_close`](Self::delayed_close);
    /// sessions that track close reasons record the interruption.
    fn interrupted(&self) {
        self.delayed_close();
    }
}

/// Session lookup and attachment.
pub trait SessionRegistry: Send + Sync + 'static {
    /// Attach `sink` as the receive channel of `session_id`, creating the
    /// session when it does not exist.
    ///
    /// Returns `false` when attachment was refused. In that case the
    /// registry has already answered through `sink` and the caller must not
    /// write anything else.
    fn attach_session<'a>(
        &'a self,
        session_id: &'a str,
        sink: Arc<dyn FrameSink>,
        start_heartbeat: bool,
    ) -> BoxFuture<'a, bool>;

    /// Look up an existing session. Never creates one.
    fn get_session(&self, session_id: &str) -> Option<Arc<dyn PollingSession>>;
}
