//! # Channel initialization with retries.
//!
//! Runs `Channel::on_init` until it succeeds, the error is not retryable, the
//! attempt budget is spent, or shutdown is requested.
//!
//! ```text
//! loop {
//!   ├─► attempt += 1
//!   ├─► on_init() bounded by init_timeout, panics caught
//!   │     ├─ Ok  ──► publish ChannelInitialized, done
//!   │     └─ Err ──► publish ChannelInitFailed
//!   │                ├─ not retryable / attempts spent ─► return Err
//!   │                ├─ publish InitBackoffScheduled{ delay }
//!   │                └─ sleep(delay) (cancellable ─► Err(Canceled))
//! }
//! ```

use std::time::Duration;

use futures::FutureExt;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::channels::{Channel, ChannelContext};
use crate::config::BusConfig;
use crate::error::ChannelError;
use crate::events::{Event, EventKind, Hub, panic_message};

/// Initializes one channel; returns the last error on failure.
pub(crate) async fn init_channel(
    channel: &dyn Channel,
    ctx: &ChannelContext,
    cfg: &BusConfig,
    hub: &Hub,
    token: &CancellationToken,
) -> Result<(), ChannelError> {
    let attempts = cfg.init_attempts_clamped();
    let mut attempt: u32 = 0;

    loop {
        if token.is_cancelled() {
            return Err(ChannelError::Canceled);
        }
        attempt += 1;

        match attempt_once(channel, ctx, cfg.init_timeout(), hub).await {
            Ok(()) => {
                hub.publish(
                    Event::new(EventKind::ChannelInitialized)
                        .with_channel(ctx.name())
                        .with_attempt(attempt),
                );
                return Ok(());
            }
            Err(err) => {
                hub.publish(
                    Event::new(EventKind::ChannelInitFailed)
                        .with_channel(ctx.name())
                        .with_attempt(attempt)
                        .with_reason(err.to_string())
                        .with_error_label(err.as_label()),
                );
                if !err.is_retryable() || attempt >= attempts {
                    return Err(err);
                }

                let delay = cfg.init_backoff.delay_for(attempt - 1);
                hub.publish(
                    Event::new(EventKind::InitBackoffScheduled)
                        .with_channel(ctx.name())
                        .with_attempt(attempt)
                        .with_delay(delay),
                );

                select! {
                    _ = time::sleep(delay) => {}
                    _ = token.cancelled() => return Err(ChannelError::Canceled),
                }
            }
        }
    }
}

/// One `on_init` call with optional timeout; a panic becomes a fatal error.
async fn attempt_once(
    channel: &dyn Channel,
    ctx: &ChannelContext,
    timeout: Option<Duration>,
    hub: &Hub,
) -> Result<(), ChannelError> {
    let call = async {
        match timeout {
            Some(limit) => time::timeout(limit, channel.on_init(ctx))
                .await
                .unwrap_or(Err(ChannelError::Timeout { timeout: limit })),
            None => channel.on_init(ctx).await,
        }
    };

    match std::panic::AssertUnwindSafe(call).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => {
            let info = panic_message(&*payload);
            hub.publish(Event::channel_panicked(ctx.name(), info.clone()));
            Err(ChannelError::Fatal {
                error: format!("on_init panicked: {info}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GlobalConfig;
    use crate::policies::BackoffPolicy;
    use crate::state::StateStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `failures` times with `err`, then succeeds.
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        err: ChannelError,
    }

    #[async_trait]
    impl Channel for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        async fn on_init(&self, _ctx: &ChannelContext) -> Result<(), ChannelError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(self.err.clone())
            } else {
                Ok(())
            }
        }
    }

    struct Sleepy;

    #[async_trait]
    impl Channel for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }
        async fn on_init(&self, _ctx: &ChannelContext) -> Result<(), ChannelError> {
            time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn fixture(hub: &Hub, name: &str) -> ChannelContext {
        let state = StateStore::new(json!({}), hub.clone()).unwrap();
        ChannelContext::new(
            Arc::from(name),
            GlobalConfig::default(),
            &state,
            hub.clone(),
            CancellationToken::new(),
        )
    }

    fn cfg(attempts: u32) -> BusConfig {
        BusConfig {
            init_attempts: attempts,
            init_backoff: BackoffPolicy::constant(Duration::from_millis(50)),
            init_timeout: Duration::from_secs(1),
            ..BusConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_retryable_errors_until_success() {
        let hub = Hub::new(32);
        let mut rx = hub.subscribe();
        let flaky = Flaky {
            calls: AtomicU32::new(0),
            failures: 2,
            err: ChannelError::fail("refused"),
        };
        let ctx = fixture(&hub, "flaky");

        init_channel(&flaky, &ctx, &cfg(3), &hub, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);

        let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ChannelInitFailed,
                EventKind::InitBackoffScheduled,
                EventKind::ChannelInitFailed,
                EventKind::InitBackoffScheduled,
                EventKind::ChannelInitialized,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_attempt_budget() {
        let hub = Hub::new(32);
        let flaky = Flaky {
            calls: AtomicU32::new(0),
            failures: 10,
            err: ChannelError::fail("refused"),
        };
        let ctx = fixture(&hub, "flaky");

        let err = init_channel(&flaky, &ctx, &cfg(2), &hub, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, ChannelError::fail("refused"));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let hub = Hub::new(32);
        let flaky = Flaky {
            calls: AtomicU32::new(0),
            failures: 1,
            err: ChannelError::fatal("bad credentials"),
        };
        let ctx = fixture(&hub, "flaky");

        let err = init_channel(&flaky, &ctx, &cfg(5), &hub, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Fatal { .. }));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_init_times_out() {
        let hub = Hub::new(32);
        let ctx = fixture(&hub, "sleepy");

        let err = init_channel(&Sleepy, &ctx, &cfg(1), &hub, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ChannelError::Timeout {
                timeout: Duration::from_secs(1)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let hub = Hub::new(32);
        let flaky = Flaky {
            calls: AtomicU32::new(0),
            failures: 10,
            err: ChannelError::fail("refused"),
        };
        let ctx = fixture(&hub, "flaky");
        let token = CancellationToken::new();
        let mut cfg = cfg(10);
        cfg.init_backoff = BackoffPolicy::constant(Duration::from_secs(3600));

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                time::sleep(Duration::from_secs(1)).await;
                token.cancel();
            })
        };

        let err = init_channel(&flaky, &ctx, &cfg, &hub, &token).await.unwrap_err();
        assert_eq!(err, ChannelError::Canceled);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
        canceller.await.unwrap();
    }
}
