//! # Stop the bus on process termination.
//!
//! Unix: `SIGINT`, `SIGTERM`, `SIGQUIT`. Elsewhere: Ctrl-C.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[cfg(unix)]
async fn termination() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = int.recv() => "SIGINT",
        _ = term.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn termination() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}

/// Cancels `token` on the first termination signal; returns early once the
/// token is cancelled by someone else.
///
/// Without signal listeners only an explicit cancellation stops the bus.
pub(crate) async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        res = termination() => match res {
            Ok(signal) => {
                info!(target: "tickbus", signal, "termination signal received");
                token.cancel();
            }
            Err(err) => {
                warn!(error = %err, "signal handlers unavailable; waiting for explicit shutdown");
                token.cancelled().await;
            }
        },
        _ = token.cancelled() => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn returns_when_token_is_cancelled() {
        let token = CancellationToken::new();
        let waiter = tokio::spawn(cancel_on_signal(token.clone()));

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
