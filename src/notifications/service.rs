//! In-process fan-out of rollup events.

use super::models::RollupEvent;
use tokio::sync::broadcast;
use tracing::debug;

pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Broadcasts [`RollupEvent`]s to every subscriber. Subscribers that fall
/// behind by more than the channel capacity miss the oldest events and see
/// `RecvError::Lagged`; since every event carries the new revision they can
/// simply reload the rollup.
#[derive(Clone)]
pub struct RollupNotifier {
    event_tx: broadcast::Sender<RollupEvent>,
}

impl RollupNotifier {
    pub fn new(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self { event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RollupEvent> {
        self.event_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.event_tx.receiver_count()
    }

    /// Never fails: having nobody listening is normal.
    pub fn notify(&self, event: RollupEvent) {
        let kind = event.as_str();
        let revision = event.revision();
        match self.event_tx.send(event) {
            Ok(receivers) => debug!(
                "Sent {} (revision {}) to {} subscriber(s)",
                kind, revision, receivers
            ),
            Err(_) => debug!("No subscribers for {} (revision {})", kind, revision),
        }
    }
}

impl Default for RollupNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}
