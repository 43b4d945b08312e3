//! # jsonpoll
//!
//! JSONP polling transport for browser messaging over plain HTTP.
//!
//! Old browsers and locked-down networks that allow neither WebSockets nor
//! cross-origin XHR can still load `<script>` tags and submit forms. This
//! crate turns those two primitives into a bidirectional, session-oriented
//! message channel:
//!
//! - **Receive**: `GET {prefix}/{session_id}/jsonp?c=<callback>` is answered
//!   with exactly one frame, wrapped as `callback("<frame>");\r\n`. The
//!   request waits until the session has something to say (open frame,
//!   queued messages, close frame) or the heartbeat interval passes.
//! - **Send**: `POST {prefix}/{session_id}/jsonp_send` carries a JSON batch
//!   of client messages, either as the form field `d` or as a raw body.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use jsonpoll::{Connection, JsonpConfig, MessageHandler};
//! use serde_json::Value;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl MessageHandler for Echo {
//!     async fn on_message(&self, conn: &Connection, message: Value) -> anyhow::Result<()> {
//!         conn.send(&message)?;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     jsonpoll::serve(JsonpConfig::default(), Arc::new(Echo)).await?;
//!     Ok(())
//! }
//! ```
//!
//! To mount the endpoint inside an existing axum application use [`app`] or
//! [`router`] with your own [`SessionManager`].

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

pub mod callback;
pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod manager;
pub mod protocol;
pub mod router;
pub mod session;
pub mod transport;

pub use config::{ConfigError, JsonpConfig, JsonpConfigBuilder, LogOutput, LoggingConfig};
pub use error::{JsonpError, JsonpResult};
pub use handler::{Connection, MessageHandler};
pub use logging::LoggingGuard;
pub use manager::SessionManager;
pub use protocol::CloseReason;
pub use router::{ServeError, app, router, serve, serve_with_shutdown};
pub use session::{Session, SessionSettings, SessionState};
pub use transport::{JsonpReceiver, PollingState, PollingTransport};

pub use jsonpoll_traits::{
    AtomicStats, BoxFuture, FrameSink, MessageBatch, PollingSession, SessionRegistry,
    TransportError, TransportResult, TransportStats,
};
