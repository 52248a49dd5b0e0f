//! Broadcast publisher for [`ActionEvent`]s.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::model::actions::ActionEvent;

const DEFAULT_CAPACITY: usize = 256;

/// Many-subscriber action stream. Subscribers only see events published
/// after they subscribed; slow subscribers may observe `Lagged`.
#[derive(Clone)]
pub struct ActionBus {
    sender: broadcast::Sender<ActionEvent>,
}

impl ActionBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: ActionEvent) {
        tracing::debug!(
            placement = %event.placement_id,
            action = ?event.action,
            sdk = %event.sdk_name,
            message = %event.message,
            "ads action"
        );
        if self.sender.send(event).is_err() {
            // no subscribers right now, which is fine
            tracing::trace!("ads action dropped without subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActionEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Republishes everything from `source` onto `target` until `lifetime` is cancelled.
pub fn forward_actions(
    mut source: broadcast::Receiver<ActionEvent>,
    target: ActionBus,
    lifetime: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = lifetime.cancelled() => break,
                received = source.recv() => match received {
                    Ok(event) => target.publish(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "action forwarder lagged behind");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    })
}

impl Default for ActionBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::actions::ActionKind;
    use crate::model::placements::PlacementType;

    #[tokio::test]
    async fn every_subscriber_receives_published_events() {
        let bus = ActionBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(ActionEvent::new("reward1", PlacementType::Rewarded, ActionKind::Requested, "sim"));

        assert_eq!(first.recv().await.unwrap().action, ActionKind::Requested);
        assert_eq!(second.recv().await.unwrap().placement_id, "reward1");
    }

    #[tokio::test]
    async fn forwarder_stops_on_cancel() {
        let source = ActionBus::new();
        let target = ActionBus::new();
        let mut merged = target.subscribe();
        let lifetime = CancellationToken::new();
        let task = forward_actions(source.subscribe(), target.clone(), lifetime.clone());

        source.publish(ActionEvent::new("inter1", PlacementType::Interstitial, ActionKind::Opened, "sim"));
        assert_eq!(merged.recv().await.unwrap().placement_id, "inter1");

        lifetime.cancel();
        task.await.unwrap();
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = ActionBus::new();
        bus.publish(ActionEvent::new("reward1", PlacementType::Rewarded, ActionKind::Clicked, "sim"));
    }
}
