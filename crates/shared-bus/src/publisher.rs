//! # Event Publisher
//!
//! Broadcast side of the bus. Every published event is counted per topic,
//! whether or not anyone was listening.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::events::{ControlPlaneEvent, EventFilter, EventTopic};
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Port through which subsystems announce state changes.
///
/// Implementations must not block; a slow listener loses events, the caller
/// never waits.
pub trait EventPublisher: Send + Sync {
    /// Returns how many subscribers the event reached.
    fn publish(&self, event: ControlPlaneEvent) -> usize;
}

/// Counters kept by [`InMemoryEventBus`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusStats {
    pub published: HashMap<EventTopic, u64>,
    /// Events published while nobody was subscribed.
    pub unheard: u64,
}

impl BusStats {
    pub fn total(&self) -> u64 {
        self.published.values().sum()
    }
}

/// Event bus over a `tokio::sync::broadcast` channel.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<ControlPlaneEvent>,
    stats: Mutex<BusStats>,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// `capacity` events are buffered per subscriber before it starts lagging.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            stats: Mutex::new(BusStats::default()),
        }
    }

    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        debug!(topics = ?filter.topics, subscribers = self.subscriber_count() + 1, "Bus subscription opened");
        Subscription::new(self.sender.subscribe(), filter)
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Events published on `topic` so far.
    #[must_use]
    pub fn published(&self, topic: EventTopic) -> u64 {
        self.stats.lock().published.get(&topic).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn stats(&self) -> BusStats {
        self.stats.lock().clone()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish(&self, event: ControlPlaneEvent) -> usize {
        let topic = event.topic();
        let reached = self.sender.send(event).unwrap_or(0);
        let mut stats = self.stats.lock();
        *stats.published.entry(topic).or_insert(0) += 1;
        if reached == 0 {
            stats.unheard += 1;
        }
        drop(stats);
        trace!(?topic, reached, "Event published");
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(id: &str) -> ControlPlaneEvent {
        ControlPlaneEvent::CircuitClosed {
            connection_id: id.into(),
        }
    }

    #[test]
    fn test_unheard_events_are_still_counted() {
        let bus = InMemoryEventBus::new();
        assert_eq!(bus.publish(closed("c")), 0);

        let stats = bus.stats();
        assert_eq!(stats.total(), 1);
        assert_eq!(stats.unheard, 1);
        assert_eq!(bus.published(EventTopic::ConnectionRecovery), 1);
        assert_eq!(bus.published(EventTopic::Admission), 0);
    }

    #[test]
    fn test_every_subscriber_is_reached_before_filtering() {
        let bus = InMemoryEventBus::new();
        let _all = bus.subscribe(EventFilter::all());
        let _admission = bus.subscribe(EventFilter::topics(vec![EventTopic::Admission]));

        assert_eq!(bus.publish(closed("c")), 2);
        assert_eq!(bus.subscriber_count(), 2);
        assert_eq!(bus.stats().unheard, 0);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let bus = InMemoryEventBus::with_capacity(0);
        let mut sub = bus.subscribe(EventFilter::all());
        bus.publish(closed("c"));
        assert_eq!(sub.drain().len(), 1);
    }
}
