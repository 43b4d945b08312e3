//! Behavior shared by HTTP polling transports

use std::fmt;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue, header};
use jsonpoll_traits::{AtomicStats, SessionRegistry};

use crate::config::JsonpConfig;

/// Cookie used for load balancer affinity.
pub const SESSION_COOKIE: &str = "JSESSIONID";

const NO_CACHE: &str = "no-store, no-cache, no-transform, must-revalidate, max-age=0";

/// Capability of a polling transport endpoint
///
/// Implementors provide the registry, configuration and counters; the
/// header helpers have shared default implementations.
pub trait PollingTransport: Clone + Send + Sync + 'static {
    /// Registry the transport attaches sessions through
    type Registry: SessionRegistry;

    /// Session registry
    fn registry(&self) -> &Arc<Self::Registry>;

    /// Transport configuration
    fn config(&self) -> &JsonpConfig;

    /// Transport counters
    fn stats(&self) -> &Arc<AtomicStats>;

    /// Echo or assign the affinity cookie when the endpoint asks for one
    fn handle_session_cookie(&self, request: &HeaderMap, response: &mut HeaderMap) {
        if !self.config().cookie_needed {
            return;
        }

        let value = session_cookie(request).unwrap_or("dummy");
        if let Ok(cookie) = HeaderValue::from_str(&format!("{SESSION_COOKIE}={value}; Path=/")) {
            response.append(header::SET_COOKIE, cookie);
        }
    }

    /// Forbid caching of the response
    fn disable_cache(&self, response: &mut HeaderMap) {
        response.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    }

    /// Cross-origin headers for browsers posting from another origin
    fn preflight(&self, request: &HeaderMap, response: &mut HeaderMap) {
        let origin = request
            .get(header::ORIGIN)
            .filter(|origin| origin.as_bytes() != b"null")
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static("*"));

        response.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        response.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        if let Some(requested) = request.get(header::ACCESS_CONTROL_REQUEST_HEADERS) {
            response.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        }
    }
}

/// Value of the affinity cookie in a request, if any
fn session_cookie(request: &HeaderMap) -> Option<&str> {
    request
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Shared router state for polling endpoints
pub struct PollingState<R> {
    registry: Arc<R>,
    config: Arc<JsonpConfig>,
    stats: Arc<AtomicStats>,
}

impl<R: SessionRegistry> PollingState<R> {
    /// State with fresh counters
    pub fn new(registry: Arc<R>, config: Arc<JsonpConfig>) -> Self {
        Self {
            registry,
            config,
            stats: Arc::new(AtomicStats::new()),
        }
    }

    /// Record into existing counters
    #[must_use]
    pub fn with_stats(mut self, stats: Arc<AtomicStats>) -> Self {
        self.stats = stats;
        self
    }
}

impl<R> Clone for PollingState<R> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            config: self.config.clone(),
            stats: self.stats.clone(),
        }
    }
}

impl<R> fmt::Debug for PollingState<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollingState")
            .field("prefix", &self.config.prefix)
            .finish_non_exhaustive()
    }
}

impl<R: SessionRegistry> PollingTransport for PollingState<R> {
    type Registry = R;

    fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    fn config(&self) -> &JsonpConfig {
        &self.config
    }

    fn stats(&self) -> &Arc<AtomicStats> {
        &self.stats
    }
}
