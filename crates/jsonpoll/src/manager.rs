//! Session registry with idle-session expiry

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use jsonpoll_traits::{
    AtomicStats, BoxFuture, FrameSink, PollingSession, SessionRegistry, TransportStats,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::config::JsonpConfig;
use crate::handler::MessageHandler;
use crate::session::{Session, SessionSettings};

/// Whether `id` can name a session
///
/// Dots are refused so ids never collide with file-like path segments.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty() && !id.contains('.')
}

/// Owns every live session of one endpoint
///
/// Sessions are created on the first receive request that names them and
/// removed by a background reaper once they went without a receive channel
/// for longer than the disconnect delay.
pub struct SessionManager {
    sessions: DashMap<String, Arc<Session>>,
    handler: Arc<dyn MessageHandler>,
    settings: SessionSettings,
    stats: Arc<AtomicStats>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Create a manager and start its reaper
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(handler: Arc<dyn MessageHandler>, config: &JsonpConfig) -> Arc<Self> {
        Self::with_stats(handler, config, Arc::new(AtomicStats::new()))
    }

    /// Create a manager that records into existing counters
    pub fn with_stats(
        handler: Arc<dyn MessageHandler>,
        config: &JsonpConfig,
        stats: Arc<AtomicStats>,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            sessions: DashMap::new(),
            handler,
            settings: SessionSettings::from(config),
            stats,
            reaper: Mutex::new(None),
        });

        let handle = spawn_reaper(Arc::downgrade(&manager), config.gc_interval);
        *manager.reaper.lock() = Some(handle);
        manager
    }

    /// Look up a session by id
    pub fn session(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(session_id).map(|entry| entry.value().clone())
    }

    /// Number of registered sessions, closed ones included until they expire
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Shared counters
    pub fn stats_handle(&self) -> Arc<AtomicStats> {
        self.stats.clone()
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> TransportStats {
        self.stats.snapshot()
    }

    /// Close and drop every session whose receive channel has been gone
    /// for longer than the disconnect delay
    ///
    /// Returns the number of removed sessions.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.value().clone())
            .collect();

        let mut removed = 0;
        for session in expired {
            session.close();
            if self
                .sessions
                .remove_if(session.id(), |_, current| Arc::ptr_eq(current, &session))
                .is_some()
            {
                self.stats.session_removed();
                removed += 1;
                debug!(session_id = %session.id(), "session expired");
            }
        }
        removed
    }

    /// Stop the reaper and close every session
    pub fn shutdown(&self) {
        if let Some(reaper) = self.reaper.lock().take() {
            reaper.abort();
        }

        let sessions: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.sessions.clear();

        for session in &sessions {
            session.close();
            self.stats.session_removed();
        }
        info!(closed = sessions.len(), "session manager shut down");
    }

    fn get_or_create(&self, session_id: &str) -> Arc<Session> {
        if let Some(existing) = self.sessions.get(session_id) {
            return existing.value().clone();
        }

        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                self.stats.session_opened();
                debug!(session_id, "session created");
                Session::new(
                    session_id,
                    self.handler.clone(),
                    self.settings,
                    self.stats.clone(),
                )
            })
            .value()
            .clone()
    }
}

fn spawn_reaper(manager: Weak<SessionManager>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(manager) = manager.upgrade() else {
                break;
            };
            let removed = manager.sweep();
            if removed > 0 {
                trace!(removed, "session sweep");
            }
        }
    })
}

impl SessionRegistry for SessionManager {
    fn attach_session<'a>(
        &'a self,
        session_id: &'a str,
        sink: Arc<dyn FrameSink>,
        start_heartbeat: bool,
    ) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            if !is_valid_session_id(session_id) {
                debug!(session_id, "invalid session id");
                sink.session_not_found();
                return false;
            }

            let session = self.get_or_create(session_id);
            if !session.set_handler(sink, start_heartbeat) {
                return false;
            }
            session.verify_state().await;
            true
        })
    }

    fn get_session(&self, session_id: &str) -> Option<Arc<dyn PollingSession>> {
        self.session(session_id)
            .map(|session| session as Arc<dyn PollingSession>)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(reaper) = self.reaper.get_mut().take() {
            reaper.abort();
        }
    }
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.sessions.len())
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Connection;
    use jsonpoll_traits::{TransportError, TransportResult};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    struct Echo;

    #[async_trait::async_trait]
    impl MessageHandler for Echo {
        async fn on_message(&self, conn: &Connection, message: Value) -> anyhow::Result<()> {
            conn.send(&message)?;
            Ok(())
        }
    }

    #[derive(Debug)]
    struct OneShotSink {
        frames: Mutex<Vec<String>>,
        active: Mutex<bool>,
        not_found: Mutex<bool>,
        session: Mutex<Option<Weak<dyn PollingSession>>>,
    }

    impl OneShotSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(Vec::new()),
                active: Mutex::new(true),
                not_found: Mutex::new(false),
                session: Mutex::new(None),
            })
        }
    }

    impl FrameSink for OneShotSink {
        fn transport_name(&self) -> &'static str {
            "test"
        }

        fn send_pack(&self, message: &str, _binary: bool) -> TransportResult<()> {
            let mut active = self.active.lock();
            if !*active {
                return Err(TransportError::Inactive);
            }
            *active = false;
            self.frames.lock().push(message.to_string());
            Ok(())
        }

        fn is_active(&self) -> bool {
            *self.active.lock()
        }

        fn session_not_found(&self) {
            *self.active.lock() = false;
            *self.not_found.lock() = true;
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

    fn config() -> JsonpConfig {
        JsonpConfig::builder()
            .disconnect_delay(Duration::from_secs(5))
            .gc_interval(Duration::from_secs(1))
            .build()
    }

    #[test]
    fn test_session_id_validation() {
        assert!(is_valid_session_id("abc-123"));
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("a.b"));
    }

    #[tokio::test]
    async fn test_attach_creates_and_opens_session() {
        let manager = SessionManager::new(Arc::new(Echo), &config());
        let sink = OneShotSink::new();

        assert!(manager.attach_session("s1", sink.clone(), false).await);
        assert_eq!(*sink.frames.lock(), vec!["o"]);
        assert_eq!(manager.session_count(), 1);
        assert_eq!(manager.stats().sessions_opened, 1);
        assert!(manager.get_session("s1").is_some());
        assert!(manager.get_session("nope").is_none());
    }

    #[tokio::test]
    async fn test_attach_rejects_invalid_id() {
        let manager = SessionManager::new(Arc::new(Echo), &config());
        let sink = OneShotSink::new();

        assert!(!manager.attach_session("bad.id", sink.clone(), false).await);
        assert!(*sink.not_found.lock());
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_reattach_returns_existing_session() {
        let manager = SessionManager::new(Arc::new(Echo), &config());
        assert!(manager.attach_session("s1", OneShotSink::new(), false).await);

        let second = OneShotSink::new();
        assert!(manager.attach_session("s1", second.clone(), false).await);
        assert!(second.frames.lock().is_empty());
        assert!(second.session().is_some());
        assert_eq!(manager.session_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_expires_detached_sessions() {
        let manager = SessionManager::new(Arc::new(Echo), &config());
        assert!(manager.attach_session("s1", OneShotSink::new(), false).await);
        let session = manager.session("s1").unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(manager.session_count(), 1);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(manager.session_count(), 0);
        assert!(session.is_closed());
        assert_eq!(manager.stats().active_sessions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attached_session_does_not_expire() {
        let manager = SessionManager::new(Arc::new(Echo), &config());
        assert!(manager.attach_session("s1", OneShotSink::new(), false).await);
        assert!(manager.attach_session("s1", OneShotSink::new(), false).await);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(manager.session_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything() {
        let manager = SessionManager::new(Arc::new(Echo), &config());
        assert!(manager.attach_session("a", OneShotSink::new(), false).await);
        assert!(manager.attach_session("b", OneShotSink::new(), false).await);

        let a = manager.session("a").unwrap();
        manager.shutdown();

        assert_eq!(manager.session_count(), 0);
        assert!(a.is_closed());
        assert_eq!(manager.stats().sessions_closed, 2);
    }
}
