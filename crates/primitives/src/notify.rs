use tokio::sync::mpsc;

/// Creates a single-slot notification channel.
///
/// The channel holds at most one pending token: notifying while a token is
/// already pending is a no-op, so any burst of notifications collapses into
/// exactly one wake-up of the listener. This is the lock-free primitive
/// behind "request an operation" triggers in the role event loops.
pub fn notify_channel() -> (Notifier, NotifyListener) {
    let (tx, rx) = mpsc::channel(1);
    (Notifier { tx }, NotifyListener { rx })
}

/// The sending half of a single-slot notification channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<()>,
}

impl Notifier {
    /// Request a wake-up of the listener. Coalesces with any pending request.
    pub fn notify(&self) {
        let _ = self.tx.try_send(());
    }
}

/// The receiving half of a single-slot notification channel.
#[derive(Debug)]
pub struct NotifyListener {
    rx: mpsc::Receiver<()>,
}

impl NotifyListener {
    /// Wait for the next notification token. Returns `None` if every
    /// [`Notifier`] has been dropped.
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_of_notifications_coalesces_into_one_token() {
        let (notifier, mut listener) = notify_channel();

        for _ in 0..100 {
            notifier.notify();
        }

        assert_eq!(listener.recv().await, Some(()));
        assert!(listener.rx.try_recv().is_err(), "only one token should be pending");
    }

    #[tokio::test]
    async fn notification_after_consumption_is_delivered() {
        let (notifier, mut listener) = notify_channel();

        notifier.notify();
        assert_eq!(listener.recv().await, Some(()));

        notifier.notify();
        notifier.notify();
        assert_eq!(listener.recv().await, Some(()));
        assert!(listener.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn recv_returns_none_when_all_notifiers_dropped() {
        let (notifier, mut listener) = notify_channel();
        drop(notifier);

        assert_eq!(listener.recv().await, None);
    }
}
