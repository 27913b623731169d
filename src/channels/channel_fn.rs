//! # Closure-backed channel (`ChannelFn`)
//!
//! [`ChannelFn`] wraps `F: Fn(ChannelContext, Message) -> Fut` and forwards
//! every message to it. Each call produces a fresh future that owns its
//! arguments; share state across calls through `Arc` captured by the closure.
//!
//! ## Example
//! ```rust
//! use tickbus::{Channel, ChannelContext, ChannelError, ChannelFn, ChannelRef, Message};
//!
//! let echo: ChannelRef = ChannelFn::arc("echo", |ctx: ChannelContext, msg: Message| async move {
//!     if msg.topic.as_ref() == "ping" {
//!         ctx.publish("pong", (*msg.payload).clone());
//!     }
//!     Ok::<_, ChannelError>(())
//! });
//!
//! assert_eq!(echo.name(), "echo");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::channels::{Channel, ChannelContext, Message};
use crate::error::ChannelError;

/// Message-only channel backed by a closure.
pub struct ChannelFn<F> {
    name: Cow<'static, str>,
    f: F,
    capacity: usize,
}

impl<F> ChannelFn<F> {
    /// Creates a new closure-backed channel.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            capacity: 1024,
        }
    }

    /// Creates the channel and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }

    /// Overrides the queue capacity (default 1024).
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

#[async_trait]
impl<F, Fut> Channel for ChannelFn<F>
where
    F: Fn(ChannelContext, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ChannelError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_message(&self, ctx: &ChannelContext, msg: &Message) -> Result<(), ChannelError> {
        (self.f)(ctx.clone(), msg.clone()).await
    }

    fn queue_capacity(&self) -> usize {
        self.capacity
    }
}

impl<F> std::fmt::Debug for ChannelFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelFn").field("name", &self.name).finish()
    }
}
