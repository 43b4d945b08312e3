//! Transport statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// A serializable snapshot of transport and session counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStats {
    /// Sessions created since startup.
    pub sessions_opened: u64,

    /// Sessions that reached the closed state.
    pub sessions_closed: u64,

    /// Sessions currently registered.
    pub active_sessions: u64,

    /// Frames written to receive responses.
    pub frames_sent: u64,

    /// Response body bytes written by receive responses.
    pub bytes_sent: u64,

    /// Individual client messages dispatched to the application.
    pub messages_received: u64,

    /// Frames that could not be written because the client went away.
    pub write_failures: u64,

    /// Send requests rejected for a missing or undecodable payload.
    pub rejected_payloads: u64,

    /// Batches the application failed to process.
    pub handler_failures: u64,
}

/// Lock-free counters shared by the registry and the transport handlers.
#[derive(Debug, Default)]
pub struct AtomicStats {
    /// Sessions created (atomic counter).
    pub sessions_opened: AtomicU64,

    /// Sessions closed (atomic counter).
    pub sessions_closed: AtomicU64,

    /// Sessions currently registered (atomic gauge).
    pub active_sessions: AtomicU64,

    /// Frames written (atomic counter).
    pub frames_sent: AtomicU64,

    /// Bytes written (atomic counter).
    pub bytes_sent: AtomicU64,

    /// Client messages dispatched (atomic counter).
    pub messages_received: AtomicU64,

    /// Failed frame writes (atomic counter).
    pub write_failures: AtomicU64,

    /// Rejected send payloads (atomic counter).
    pub rejected_payloads: AtomicU64,

    /// Application handler failures (atomic counter).
    pub handler_failures: AtomicU64,
}

impl AtomicStats {
    /// Creates a new `AtomicStats` instance with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one written frame of `len` bytes.
    pub fn record_frame(&self, len: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Record a newly registered session.
    pub fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session leaving the registry.
    pub fn session_removed(&self) {
        // Saturate so a double removal cannot wrap the gauge.
        let _ = self
            .active_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
    }

    /// Creates a serializable snapshot from the current atomic values.
    pub fn snapshot(&self) -> TransportStats {
        TransportStats {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
            active_sessions: self.active_sessions.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            rejected_payloads: self.rejected_payloads.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.sessions_opened,
            &self.sessions_closed,
            &self.active_sessions,
            &self.frames_sent,
            &self.bytes_sent,
            &self.messages_received,
            &self.write_failures,
            &self.rejected_payloads,
            &self.handler_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_default() {
        let stats = AtomicStats::new();
        assert_eq!(stats.snapshot(), TransportStats::default());
    }

    #[test]
    fn test_record_frame() {
        let stats = AtomicStats::new();
        stats.record_frame(12);
        stats.record_frame(3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_sent, 2);
        assert_eq!(snapshot.bytes_sent, 15);
    }

    #[test]
    fn test_active_sessions_never_underflows() {
        let stats = AtomicStats::new();
        stats.session_opened();
        stats.session_removed();
        stats.session_removed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.sessions_opened, 1);
        assert_eq!(snapshot.active_sessions, 0);
    }

    #[test]
    fn test_reset() {
        let stats = AtomicStats::new();
        stats.record_frame(100);
        stats.handler_failures.fetch_add(1, Ordering::Relaxed);
        stats.reset();
        assert_eq!(stats.snapshot(), TransportStats::default());
    }
}
