//! Echo server over the JSONP transport
//!
//! Every message a browser posts is sent straight back on its receive
//! channel. A message `"close"` ends the session.
//!
//! ```text
//! cargo run -p jsonpoll-demo -- [config.toml]
//! curl 'http://127.0.0.1:8081/echo/abc/jsonp?c=cb'
//! curl -d 'd=["hello"]' http://127.0.0.1:8081/echo/abc/jsonp_send
//! ```

use std::sync::Arc;

use jsonpoll::{CloseReason, Connection, JsonpConfig, MessageHandler};
use serde_json::Value;
use tracing::info;

struct Echo;

#[async_trait::async_trait]
impl MessageHandler for Echo {
    async fn on_open(&self, conn: &Connection) {
        info!(session_id = conn.session_id(), "client connected");
    }

    async fn on_message(&self, conn: &Connection, message: Value) -> anyhow::Result<()> {
        if message.as_str() == Some("close") {
            conn.close_with(CloseReason::new(3000, "Bye!"));
            return Ok(());
        }
        conn.send(&message)?;
        Ok(())
    }

    async fn on_close(&self, conn: &Connection) {
        info!(session_id = conn.session_id(), "client disconnected");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => JsonpConfig::from_file(path)?,
        None => JsonpConfig::default(),
    };

    let _guard = config.logging.init()?;
    jsonpoll::serve(config, Arc::new(Echo)).await?;
    Ok(())
}
