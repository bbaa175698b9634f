// Shutdown signalling for worker loops and the maintenance scheduler

use tokio::sync::watch;

/// Receiving half; clone one per background loop
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is signalled, or the sender is dropped
    pub async fn wait(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Sending half, owned by the composition root
#[derive(Debug)]
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal every token. Idempotent.
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_every_clone_sees_shutdown() {
        let (tx, token) = shutdown_channel();
        let mut a = token.clone();
        let mut b = token.clone();
        assert!(!token.is_shutdown());

        tx.shutdown();

        a.wait().await;
        b.wait().await;
        assert!(token.is_shutdown());
    }

    #[tokio::test]
    async fn test_token_cloned_after_signal_returns_immediately() {
        let (tx, token) = shutdown_channel();
        tx.shutdown();

        let mut late = token.clone();
        tokio::time::timeout(Duration::from_secs(1), late.wait())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_sender_releases_waiters() {
        let (tx, mut token) = shutdown_channel();
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), token.wait())
            .await
            .unwrap();
    }
}
