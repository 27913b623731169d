//! # Example: websocket_setup
//!
//! Assembles a bus the way a websocket-backed chat client would:
//! one channel owns the (simulated) connection, another collects chat messages.
//!
//! Shows how to:
//! - Register channels with [`Bus::builder`] and `with_channels`.
//! - Read the global config (`websocketHost`, `websocketPort`) from a channel.
//! - Enable a one-second tick and seed the shared state.
//! - Attach the built-in [`LogWriter`] and watch state changes from outside.
//!
//! ## Flow
//! ```text
//! Bus::builder()
//!     .with_channels([socket, chat])
//!     .with_config({ websocketHost, websocketPort })
//!     .enable_tick(1000)
//!     .init_with({ websocketConnected: false, messages: [] })
//!
//! socket.on_init  ──► state.websocketConnected = true
//! socket.on_tick  ──► publish("chat.received", { text })  (every 2nd tick)
//! chat.on_message ──► state.messages.push(text)
//! socket.on_shutdown ──► state.websocketConnected = false
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=tickbus=debug cargo run --example websocket_setup
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tickbus::{
    Bus, Channel, ChannelContext, ChannelError, ChannelFn, ChannelRef, LogWriter, Message,
    Subscribe, Tick,
};
use tracing_subscriber::EnvFilter;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocketConfig {
    websocket_host: String,
    websocket_port: u16,
}

/// Pretends to hold a websocket connection to the configured endpoint.
struct Socket;

#[async_trait]
impl Channel for Socket {
    fn name(&self) -> &str {
        "socket"
    }

    async fn on_init(&self, ctx: &ChannelContext) -> Result<(), ChannelError> {
        let cfg: SocketConfig = ctx
            .config()
            .deserialize()
            .map_err(|e| ChannelError::fatal(e.to_string()))?;
        tracing::info!(host = %cfg.websocket_host, port = cfg.websocket_port, "connecting");

        ctx.state()
            .set("websocketConnected", true)
            .map_err(|e| ChannelError::fail(e.to_string()))?;
        Ok(())
    }

    async fn on_tick(&self, ctx: &ChannelContext, tick: Tick) -> Result<(), ChannelError> {
        if tick.n % 2 == 0 {
            ctx.publish("chat.received", json!({ "text": format!("server says hi #{}", tick.n / 2) }));
        }
        Ok(())
    }

    async fn on_shutdown(&self, ctx: &ChannelContext) {
        let _ = ctx.state().set("websocketConnected", false);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tickbus=info")),
        )
        .init();

    let chat: ChannelRef = ChannelFn::arc("chat", |ctx: ChannelContext, msg: Message| async move {
        if msg.topic.as_ref() != "chat.received" {
            return Ok(());
        }
        let text = msg.payload["text"].clone();
        ctx.state()
            .append("messages", text)
            .map(|_| ())
            .map_err(|e| ChannelError::fail(e.to_string()))
    });

    let socket: ChannelRef = Arc::new(Socket);
    let observers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let handle = Bus::builder()
        .with_channels(vec![socket, chat])
        .with_config(json!({
            "websocketHost": "localhost",
            "websocketPort": 8080,
        }))
        .enable_tick(1000)
        .init_with(json!({
            "websocketConnected": false,
            "messages": [],
        }))
        .with_subscribers(observers)
        .build()?
        .start();

    let mut versions = handle.state().watch();
    let deadline = tokio::time::sleep(Duration::from_secs(7));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            changed = versions.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = handle.state().snapshot();
                println!("[state v{}] {state}", *versions.borrow());
            }
        }
    }

    handle.shutdown().await?;
    Ok(())
}
