//! The receive side of a polling transport as seen by a session.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::TransportResult;
use crate::session::PollingSession;

/// A single in-flight receive response that a session can write one frame to.
///
/// Polling sinks are created per HTTP request. Once a frame has been handed
/// to [`send_pack`](FrameSink::send_pack) the sink stops being active and
/// must refuse any further frame.
pub trait FrameSink: Send + Sync + fmt::Debug {
    /// Short transport name used in logs and errors.
    fn transport_name(&self) -> &'static str;

    /// Frame `message` and write it as the response body.
    ///
    /// # Errors
    ///
    /// Fails with a fatal error when `binary` is requested from a text-only
    /// transport, and with [`TransportError::Inactive`](crate::TransportError::Inactive)
    /// when the sink already wrote its response.
    fn send_pack(&self, message: &str, binary: bool) -> TransportResult<()>;

    /// Whether the sink can still write its response.
    fn is_active(&self) -> bool;

    /// Answer the request with "session not found".
    fn session_not_found(&self);

    /// Record the session this sink is attached to.
    ///
    /// The sink only keeps a weak reference; the registry owns sessions.
    fn attach(&self, session: Weak<dyn PollingSession>);

    /// Forget the attached session.
    fn detach(&self);

    /// The attached session, if it is still attached and alive.
    fn session(&self) -> Option<Arc<dyn PollingSession>>;
}
