use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Owns the monitor's shutdown token.
/// Cancelled by SIGTERM (Ctrl+C off unix) or by any holder of the token.
#[derive(Debug)]
pub struct ShutdownGuard {
    token: CancellationToken,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// The token every task should watch.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn a background task that cancels the token on an OS signal.
    /// The task ends quietly if the token is cancelled first.
    pub fn spawn_signal_listener(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                received = wait_for_signal() => {
                    if received {
                        tracing::info!("termination signal received, shutting down monitor");
                        token.cancel();
                    }
                }
            }
        });
    }
}

/// Resolves once the process is asked to terminate. `false` if no handler could be registered.
#[cfg(unix)]
async fn wait_for_signal() -> bool {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => sigterm.recv().await.is_some(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler");
            false
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
    signal::ctrl_c().await.is_ok()
}

impl Default for ShutdownGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_clones_share_cancellation() {
        let guard = ShutdownGuard::new();
        guard.spawn_signal_listener();
        let token = guard.token();
        assert!(!guard.is_shutting_down());
        token.cancel();
        assert!(guard.is_shutting_down());
        guard.token().cancelled().await;
    }
}
