//! SockJS-style frame encoding.
//!
//! Every frame is a short string. Polling transports wrap the frame string
//! again (for JSONP: as the argument of a script callback).

use std::borrow::Cow;
use std::fmt;

use serde::Serialize;

/// First frame of every session.
pub const OPEN_FRAME: &str = "o";

/// Keep-alive frame.
pub const HEARTBEAT_FRAME: &str = "h";

/// JSON-encode a value the way frames expect it.
pub fn json_encode<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

/// Build an `a[...]` frame from already JSON-encoded messages.
pub fn message_frame<S: AsRef<str>>(encoded: &[S]) -> String {
    let mut frame = String::with_capacity(
        3 + encoded.iter().map(|m| m.as_ref().len() + 1).sum::<usize>(),
    );
    frame.push_str("a[");
    for (i, message) in encoded.iter().enumerate() {
        if i > 0 {
            frame.push(',');
        }
        frame.push_str(message.as_ref());
    }
    frame.push(']');
    frame
}

/// Why a session was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// Numeric close code.
    pub code: u16,
    /// Human-readable reason.
    pub reason: Cow<'static, str>,
}

impl CloseReason {
    /// Server-initiated close.
    pub const GO_AWAY: Self = Self::fixed(3000, "Go away!");

    /// A second receive channel tried to attach while one is still open.
    pub const ANOTHER_CONNECTION: Self = Self::fixed(2010, "Another connection still open");

    /// The client went away while a receive channel was attached.
    pub const INTERRUPTED: Self = Self::fixed(1002, "Connection interrupted");

    const fn fixed(code: u16, reason: &'static str) -> Self {
        Self {
            code,
            reason: Cow::Borrowed(reason),
        }
    }

    /// Custom close reason.
    pub fn new(code: u16, reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// The `c[code,"reason"]` frame for this reason.
    pub fn frame(&self) -> String {
        // A &str always encodes.
        let reason = json_encode(self.reason.as_ref()).unwrap_or_else(|_| "\"\"".to_string());
        format!("c[{},{}]", self.code, reason)
    }
}

impl Default for CloseReason {
    fn default() -> Self {
        Self::GO_AWAY
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason)
    }
}
