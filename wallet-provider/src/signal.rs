//! Shutdown signal handling for long-running sessions.
//!
//! [`SigDown`] listens for SIGTERM/SIGINT on Unix (Ctrl+C elsewhere) and
//! cancels a [`CancellationToken`]. The token can also be cancelled from
//! inside the session, e.g. when its input reaches end of file, so both paths
//! converge on the same teardown.

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Cancels its token on SIGTERM / SIGINT / Ctrl+C.
#[allow(missing_debug_implementations)]
pub struct SigDown {
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl SigDown {
    /// Creates a new signal handler and spawns the background listener.
    ///
    /// # Errors
    ///
    /// Returns an [`std::io::Error`] if signal registration fails.
    #[allow(clippy::unnecessary_wraps)]
    pub fn try_new() -> Result<Self, std::io::Error> {
        let cancellation_token = CancellationToken::new();
        let token = cancellation_token.clone();
        let task_tracker = TaskTracker::new();

        #[cfg(unix)]
        {
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;
            task_tracker.spawn(async move {
                tokio::select! {
                    _ = sigterm.recv() => tracing::debug!("SIGTERM received"),
                    _ = sigint.recv() => tracing::debug!("SIGINT received"),
                    () = token.cancelled() => return,
                }
                token.cancel();
            });
        }

        #[cfg(not(unix))]
        {
            task_tracker.spawn(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::debug!("Ctrl+C received"),
                    () = token.cancelled() => return,
                }
                token.cancel();
            });
        }

        task_tracker.close();
        Ok(Self {
            task_tracker,
            cancellation_token,
        })
    }

    /// Returns a clone of the cancellation token for distributing to subsystems.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Ends the session without waiting for a signal.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    /// Waits for cancellation and for the listener task to finish.
    pub async fn recv(&self) {
        self.cancellation_token.cancelled().await;
        self.task_tracker.wait().await;
    }
}
