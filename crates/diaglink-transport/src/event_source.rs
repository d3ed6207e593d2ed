//! In-process system event broadcaster.

use std::sync::{Mutex, PoisonError};

use diaglink_core::{SystemEventSource, SystemSignal};
use tokio::sync::mpsc;

struct Subscriber {
    action: String,
    tx: mpsc::UnboundedSender<SystemSignal>,
}

/// Fans out named signals to every subscriber of that name.
///
/// Hosts wire their own platform notification (a signal handler, a file
/// watcher, ...) into [`BroadcastEventSource::broadcast`].
#[derive(Default)]
pub struct BroadcastEventSource {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl BroadcastEventSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `action` to its subscribers. Returns how many received it.
    pub fn broadcast(&self, action: &str) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|s| !s.tx.is_closed());

        let mut delivered = 0;
        for subscriber in subscribers.iter().filter(|s| s.action == action) {
            if subscriber.tx.send(SystemSignal::new(action)).is_ok() {
                delivered += 1;
            }
        }
        tracing::debug!(action, delivered, "Broadcast system signal");
        delivered
    }
}

impl SystemEventSource for BroadcastEventSource {
    fn subscribe(&self, action: &str) -> mpsc::UnboundedReceiver<SystemSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                action: action.to_string(),
                tx,
            });
        rx
    }
}
