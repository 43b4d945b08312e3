//! Router construction and the standalone server

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::JsonpConfig;
use crate::handler::MessageHandler;
use crate::manager::SessionManager;
use crate::transport::{
    PollingState, PollingTransport, jsonp_receive, jsonp_send, jsonp_send_options,
};

/// Errors of [`serve`]
#[derive(Debug, Error)]
pub enum ServeError {
    /// `bind_addr` is not a socket address
    #[error("Invalid address '{addr}': {source}")]
    InvalidAddress {
        /// Configured address
        addr: String,
        /// Parse failure
        source: std::net::AddrParseError,
    },

    /// Listener could not be bound
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        /// Parsed address
        addr: SocketAddr,
        /// IO failure
        source: std::io::Error,
    },

    /// The server loop failed
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSONP routes for `transport`, relative to the endpoint prefix
///
/// - `GET /{session_id}/jsonp?c=<callback>`
/// - `POST /{session_id}/jsonp_send`
/// - `OPTIONS /{session_id}/jsonp_send`
pub fn router<T: PollingTransport>(transport: T) -> Router {
    let body_limit = transport.config().max_body_size;

    Router::new()
        .route("/{session_id}/jsonp", get(jsonp_receive::<T>))
        .route(
            "/{session_id}/jsonp_send",
            post(jsonp_send::<T>).options(jsonp_send_options::<T>),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(transport)
}

/// Full application: JSONP routes under the configured prefix, with request
/// tracing
pub fn app(manager: Arc<SessionManager>, config: Arc<JsonpConfig>) -> Router {
    let prefix = config.normalized_prefix();
    let stats = manager.stats_handle();
    let routes = router(PollingState::new(manager, config).with_stats(stats));

    let app = if prefix.is_empty() {
        Router::new().merge(routes)
    } else {
        Router::new().nest(&prefix, routes)
    };
    app.layer(TraceLayer::new_for_http())
}

/// Serve `handler` until `shutdown` resolves
///
/// Every session is closed once the listener stops.
///
/// # Errors
///
/// Fails when the bind address is invalid or cannot be bound.
pub async fn serve_with_shutdown<F>(
    config: JsonpConfig,
    handler: Arc<dyn MessageHandler>,
    shutdown: F,
) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .map_err(|source| ServeError::InvalidAddress {
            addr: config.bind_addr.clone(),
            source,
        })?;

    let config = Arc::new(config);
    let manager = SessionManager::new(handler, &config);
    let app = app(manager.clone(), config.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;

    info!(
        "JSONP endpoint listening on http://{}{}/{{session_id}}/jsonp",
        addr,
        config.normalized_prefix()
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    manager.shutdown();
    result.map_err(ServeError::from)
}

/// Serve `handler` until Ctrl-C
///
/// # Errors
///
/// See [`serve_with_shutdown`].
pub async fn serve(config: JsonpConfig, handler: Arc<dyn MessageHandler>) -> Result<(), ServeError> {
    serve_with_shutdown(config, handler, async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
    })
    .await
}
