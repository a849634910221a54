use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use balacare_types::events::ChangeEvent;

/// Fan-out hub for row-change events.
///
/// Every subscriber receives every event; scoping (which conversation an
/// event belongs to) is the subscriber's concern via
/// [`ChangeEvent::conversation_id`]. Dropping the receiver is the
/// unsubscribe: once the owning view lets go of its handle, nothing is
/// delivered to it anymore.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<ChangeEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to the change feed. Events published after this call are
    /// buffered for the receiver; a receiver that falls more than the channel
    /// capacity behind observes a lag error instead of silent loss.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Publish an event to all current subscribers. A feed with no listeners
    /// is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        trace!("publishing {:?}", event);
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.broadcast_tx.receiver_count()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
