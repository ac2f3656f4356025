//! Topic-scoped fan-out of lifecycle events to live subscribers.
//!
//! One broadcast channel per topic gives per-topic ordering; publication is
//! fire-and-forget after the persistence commit, so a slow or absent
//! subscriber never blocks the write path. There is no durability beyond
//! "currently connected listeners see currently published events in order":
//! a reconnecting subscriber recovers state by re-reading the store.

use dishpatch_core::{OrderEvent, Topic};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

pub struct Broadcaster {
    topics: RwLock<HashMap<Topic, broadcast::Sender<OrderEvent>>>,
    capacity: usize,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Subscribe to a topic. Only events published from this moment forward
    /// are delivered; a subscriber that lags past the channel capacity must
    /// re-read the authoritative store.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<OrderEvent> {
        self.sender(topic).subscribe()
    }

    /// Deliver to all currently subscribed listeners of `topic`. An event
    /// with no listeners is dropped silently.
    pub fn publish(&self, topic: Topic, event: OrderEvent) {
        let sender = self.sender(topic);
        match sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(?topic, receivers, "published lifecycle event");
            }
            Err(_) => {
                tracing::trace!(?topic, "no subscribers for event");
            }
        }
    }

    /// Publish a lifecycle event to its order topic, and to the dashboard
    /// topic when it changes the active-order counts.
    pub fn publish_lifecycle(&self, event: &OrderEvent) {
        self.publish(Topic::Order(event.order_id), event.clone());
        if event.changes_active_count() {
            self.publish(Topic::Dashboard, event.clone());
        }
    }

    fn sender(&self, topic: Topic) -> broadcast::Sender<OrderEvent> {
        if let Some(sender) = self.topics.read().expect("topic map poisoned").get(&topic) {
            return sender.clone();
        }
        let mut topics = self.topics.write().expect("topic map poisoned");
        topics
            .entry(topic)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dishpatch_core::{EventKind, OrderStatus};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_subscribers_receive_in_publish_order() {
        let bus = Broadcaster::new(16);
        let order_id = Uuid::new_v4();
        let mut rx = bus.subscribe(Topic::Order(order_id));

        bus.publish_lifecycle(&OrderEvent::created(order_id));
        bus.publish_lifecycle(&OrderEvent::status_changed(
            order_id,
            OrderStatus::Pending,
            OrderStatus::Confirmed,
        ));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::Created);
        assert_eq!(second.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let bus = Broadcaster::new(16);
        let watched = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut rx = bus.subscribe(Topic::Order(watched));

        bus.publish_lifecycle(&OrderEvent::created(other));
        bus.publish_lifecycle(&OrderEvent::created(watched));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.order_id, watched);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dashboard_gets_count_changing_events_only() {
        let bus = Broadcaster::new(16);
        let order_id = Uuid::new_v4();
        let mut rx = bus.subscribe(Topic::Dashboard);

        bus.publish_lifecycle(&OrderEvent::status_changed(
            order_id,
            OrderStatus::Pending,
            OrderStatus::Confirmed,
        ));
        bus.publish_lifecycle(&OrderEvent::status_changed(
            order_id,
            OrderStatus::PickedUp,
            OrderStatus::Delivered,
        ));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.status, OrderStatus::Delivered);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers_does_not_panic() {
        let bus = Broadcaster::new(16);
        bus.publish_lifecycle(&OrderEvent::created(Uuid::new_v4()));
    }
}
