//! # jsonpoll Traits
//!
//! Collaborator abstractions for HTTP polling transports. A polling transport
//! splits a logical duplex connection into independent HTTP exchanges and
//! needs three things from the world around it:
//!
//! - **Sessions**: [`PollingSession`] owns the ordered send queue, the closed
//!   flag, heartbeat and close scheduling.
//! - **A registry**: [`SessionRegistry`] attaches a receive channel to a
//!   session (creating it on demand) and looks sessions up by id.
//! - **A frame sink**: [`FrameSink`] is the in-flight receive response a
//!   session writes exactly one frame to.
//!
//! Alongside these the crate carries [`MessageBatch`] (a decoded client
//! payload), [`TransportError`] and the [`AtomicStats`] counters.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]
#![deny(unsafe_code)]

mod error;
mod message;
mod session;
mod sink;
mod stats;

use std::future::Future;
use std::pin::Pin;

pub use error::{TransportError, TransportResult};
pub use message::MessageBatch;
pub use session::{PollingSession, SessionRegistry};
pub use sink::FrameSink;
pub use stats::{AtomicStats, TransportStats};

/// A boxed, sendable future borrowed for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
