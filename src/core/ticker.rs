//! # Periodic tick publisher.
//!
//! ```text
//! start ── period ──► TickFired{1} ── period ──► TickFired{2} ── ...
//! ```
//!
//! ## Rules
//! - The first tick fires one period after start, never immediately.
//! - Counter starts at 1 and increases by one per published tick.
//! - Missed ticks (runtime stalled) are skipped, not replayed in a burst.
//! - Stops as soon as the token is cancelled.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::events::{Event, Hub};

/// Spawns the ticker; the join value is the number of ticks published.
pub(crate) fn spawn(hub: Hub, period: Duration, token: CancellationToken) -> JoinHandle<u64> {
    tokio::spawn(run(hub, period, token))
}

async fn run(hub: Hub, period: Duration, token: CancellationToken) -> u64 {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut n: u64 = 0;
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                n += 1;
                hub.publish(Event::tick(n));
            }
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_period() {
        let hub = Hub::new(16);
        let mut rx = hub.subscribe();
        let token = CancellationToken::new();
        let started = Instant::now();
        let ticker = spawn(hub, Duration::from_millis(1000), token.clone());

        let first = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::TickFired);
        assert_eq!(first.tick, Some(1));
        assert!(started.elapsed() >= Duration::from_millis(1000));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.tick, Some(2));

        token.cancel();
        assert_eq!(ticker.await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_ticker_publishes_nothing() {
        let hub = Hub::new(4);
        let mut rx = hub.subscribe();
        let token = CancellationToken::new();
        token.cancel();

        let ticker = spawn(hub, Duration::from_millis(10), token);
        assert_eq!(ticker.await.unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }
}
