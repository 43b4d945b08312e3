//! HTTP polling transports
//!
//! [`polling`] holds what every polling transport shares: the
//! [`PollingTransport`] capability and its header helpers. The JSONP
//! transport is split into its receive side ([`receive`]) and its send side
//! ([`send`]).

pub mod polling;
pub mod receive;
pub mod send;

pub use polling::{PollingState, PollingTransport};
pub use receive::{JsonpReceiver, jsonp_body, jsonp_receive};
pub use send::{decode_payload, jsonp_send, jsonp_send_options};
