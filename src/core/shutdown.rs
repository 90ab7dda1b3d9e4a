//! # Waiting for shutdown.
//!
//! [`wait_for_shutdown`] completes when the process receives a termination
//! signal or when the runtime's token is cancelled, whichever comes first.
//!
//! **Unix platforms:** `SIGINT` (Ctrl-C), `SIGTERM`, `SIGQUIT`.
//! **Windows platforms:** `Ctrl-C` via [`tokio::signal::ctrl_c`].

use tokio_util::sync::CancellationToken;

/// Why the runtime stopped waiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownCause {
    /// An OS termination signal arrived.
    Signal,
    /// The runtime's shutdown token was cancelled.
    Requested,
}

/// Waits for a termination signal or cancellation of `token`.
///
/// Returns `Err` if signal registration fails.
pub async fn wait_for_shutdown(token: &CancellationToken) -> std::io::Result<ShutdownCause> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Ok(ShutdownCause::Requested),
        res = wait_for_os_signal() => res.map(|()| ShutdownCause::Signal),
    }
}

#[cfg(unix)]
async fn wait_for_os_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_os_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_token_ends_the_wait() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(wait_for_shutdown(&token).await.unwrap(), ShutdownCause::Requested);
    }
}
