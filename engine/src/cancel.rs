//! Cooperative cancellation for pipeline runs.
//!
//! A [`CancelHandle`] flips a watch channel; every [`CancelSignal`] observes it
//! at the suspension points of the stages (recognizer calls). A signal can
//! also carry a deadline, which behaves exactly like an explicit cancel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

/// Create a connected handle/signal pair.
#[must_use]
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle { tx: Arc::new(tx) },
        CancelSignal { rx, deadline: None },
    )
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
            deadline: None,
        }
    }
}

impl CancelSignal {
    /// A signal that only fires through a deadline, if one is added.
    #[must_use]
    pub fn never() -> Self {
        // With the sender gone the channel can never report `true`.
        let (_, rx) = watch::channel(false);
        Self { rx, deadline: None }
    }

    /// Also fire once `timeout` has elapsed from now. Keeps an earlier deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the run is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let flipped = async move {
            if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = flipped => {}
                    () = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => flipped.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_cancels_every_signal() {
        let (handle, signal) = cancel_pair();
        let other = handle.signal();
        assert!(!signal.is_cancelled());

        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(other.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .expect("cancelled() resolves after cancel");
    }

    #[tokio::test]
    async fn never_signal_stays_quiet() {
        let signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn deadline_fires() {
        let signal = CancelSignal::never().with_timeout(Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .expect("deadline resolves cancelled()");
        assert!(signal.is_cancelled());
    }

    #[test]
    fn earlier_deadline_wins() {
        let signal = CancelSignal::never()
            .with_timeout(Duration::ZERO)
            .with_timeout(Duration::from_secs(3600));
        assert!(signal.is_cancelled());
    }
}
