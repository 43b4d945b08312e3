//! Application-side hooks for session events

use std::fmt;
use std::sync::{Arc, Weak};

use jsonpoll_traits::{TransportError, TransportResult};
use serde::Serialize;
use serde_json::Value;

use crate::protocol::CloseReason;
use crate::session::Session;

/// Application message handler
///
/// One handler instance serves every session of a [`SessionManager`](crate::SessionManager).
/// Implementations are object-safe so the manager can hold them as
/// `Arc<dyn MessageHandler>`.
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Called once when a session opens, after the open frame went out.
    ///
    /// Closing `conn` here is allowed.
    async fn on_open(&self, conn: &Connection) {
        let _ = conn;
    }

    /// Called for every message of a client batch, in order.
    ///
    /// # Errors
    ///
    /// An error aborts the rest of the batch and closes the session.
    async fn on_message(&self, conn: &Connection, message: Value) -> anyhow::Result<()>;

    /// Called once after the session closed.
    async fn on_close(&self, conn: &Connection) {
        let _ = conn;
    }
}

impl fmt::Debug for dyn MessageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<dyn MessageHandler>")
    }
}

/// Handle to a session given to application code
///
/// The handle does not keep the session alive; once the registry drops a
/// session every operation reports it as closed.
#[derive(Clone)]
pub struct Connection {
    session_id: Arc<str>,
    session: Weak<Session>,
}

impl Connection {
    pub(crate) fn new(session_id: Arc<str>, session: Weak<Session>) -> Self {
        Self {
            session_id,
            session,
        }
    }

    /// Session identifier
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Queue a message for delivery to the client
    ///
    /// # Errors
    ///
    /// Fails if the session is gone or closing, or the value cannot be encoded.
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> TransportResult<()> {
        self.upgrade()?.send_message(message)
    }

    /// Close the session with the default reason
    pub fn close(&self) {
        if let Some(session) = self.session.upgrade() {
            session.close();
        }
    }

    /// Close the session with a custom reason
    pub fn close_with(&self, reason: CloseReason) {
        if let Some(session) = self.session.upgrade() {
            session.close_with(reason);
        }
    }

    /// Whether the session is closed or no longer registered
    pub fn is_closed(&self) -> bool {
        self.session
            .upgrade()
            .is_none_or(|session| session.is_closed())
    }

    fn upgrade(&self) -> TransportResult<Arc<Session>> {
        self.session
            .upgrade()
            .ok_or_else(|| TransportError::SessionClosed(self.session_id.to_string()))
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.session_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}
