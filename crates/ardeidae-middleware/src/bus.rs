//! Topic-partitioned event bus shared by the host links, the pipeline, the
//! render loops and the cockpit.
//!
//! Every [`Topic`] owns its own `tokio::sync::broadcast` channel.  A slow
//! subscriber lags (and is told how many events it missed) instead of
//! stalling publishers or the other subscribers.
//!
//! | Topic | Publisher | Payload |
//! |---|---|---|
//! | [`Topic::Telemetry`] | host link | `EventPayload::Telemetry` |
//! | [`Topic::HostLog`] | host link | `EventPayload::HostLog` |
//! | [`Topic::Operator`] | cockpit | `EventPayload::Operator` |
//! | [`Topic::Frames`] | render loops | `EventPayload::Frame` |
//! | [`Topic::Dashboard`] | pipeline | `EventPayload::LogAppended`, `EventPayload::StatusChanged` |

use std::sync::Arc;

use ardeidae_types::{ArdeidaeError, Event};
use tokio::sync::broadcast;

/// Events buffered per topic before slow subscribers start to lag.
const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Telemetry,
    HostLog,
    Operator,
    Frames,
    Dashboard,
}

impl Topic {
    pub const ALL: [Topic; 5] = [
        Topic::Telemetry,
        Topic::HostLog,
        Topic::Operator,
        Topic::Frames,
        Topic::Dashboard,
    ];

    fn lane(self) -> usize {
        self as usize
    }
}

/// Cloneable handle; clones publish into the same channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    lanes: Arc<[broadcast::Sender<Event>; 5]>,
}

impl EventBus {
    /// `capacity` applies to each topic separately.
    pub fn new(capacity: usize) -> Self {
        Self {
            lanes: Arc::new(Topic::ALL.map(|_| broadcast::channel(capacity).0)),
        }
    }

    /// Deliver `event` to every current subscriber of `topic`.
    ///
    /// Returns how many subscribers got it; zero subscribers is `Ok(0)`.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, ArdeidaeError> {
        Ok(self.lanes[topic.lane()].send(event).unwrap_or(0))
    }

    /// Receive everything published to `topic` from now on.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.lanes[topic.lane()].subscribe(),
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.lanes[topic.lane()].receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Subscription to one [`Topic`], from [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Next event on the topic.
    ///
    /// `Lagged(n)` means `n` events were skipped and receiving can go on;
    /// `Closed` means every publisher is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ardeidae_types::{AddressedMessage, EventPayload, OperatorCommand};

    fn make_event(source: &str) -> Event {
        Event::new(
            source,
            EventPayload::Telemetry(AddressedMessage::new("/accelerometer/angx", vec![1.0])),
        )
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::default();
        let delivered = bus.publish_to(Topic::Telemetry, make_event("test")).unwrap();
        assert_eq!(delivered, 0);
    }

    /// Two independent subscribers on the same topic both receive the event.
    #[tokio::test]
    async fn topic_multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut subscriber1 = bus.subscribe_to(Topic::Telemetry);
        let mut subscriber2 = bus.subscribe_to(Topic::Telemetry);

        let event = make_event("ardeidae-middleware::host");
        assert_eq!(bus.publish_to(Topic::Telemetry, event.clone())?, 2);

        assert_eq!(subscriber1.recv().await?.id, event.id);
        assert_eq!(subscriber2.recv().await?.id, event.id);
        Ok(())
    }

    /// A subscriber on `Operator` must not receive events published to
    /// `Telemetry` because they are routed through separate channels.
    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut operator_sub = bus.subscribe_to(Topic::Operator);

        bus.publish_to(Topic::Telemetry, make_event("host"))?;

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            operator_sub.recv(),
        )
        .await;
        assert!(result.is_err(), "Operator subscriber must not receive a Telemetry event");

        bus.publish_to(
            Topic::Operator,
            Event::new("cockpit", EventPayload::Operator(OperatorCommand::Calibrate)),
        )?;
        let event = operator_sub.recv().await?;
        assert!(matches!(
            event.payload,
            EventPayload::Operator(OperatorCommand::Calibrate)
        ));
        assert_eq!(operator_sub.topic(), Topic::Operator);
        Ok(())
    }

    /// Flooding a low-capacity channel while a subscriber sleeps must produce
    /// a `Lagged` error rather than panicking or blocking.
    #[tokio::test]
    async fn topic_channel_lag_on_slow_subscriber() {
        let bus = EventBus::new(16);
        let mut slow_sub = bus.subscribe_to(Topic::Frames);

        for _ in 0..1_000 {
            let _ = bus.publish_to(Topic::Frames, make_event("flood"));
        }

        let result = slow_sub.recv().await;
        assert!(
            matches!(result, Err(broadcast::error::RecvError::Lagged(_))),
            "expected Lagged error, got: {result:?}"
        );
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(Topic::HostLog), 0);
        let rx = bus.subscribe_to(Topic::HostLog);
        assert_eq!(bus.subscriber_count(Topic::HostLog), 1);
        drop(rx);
        assert_eq!(bus.subscriber_count(Topic::HostLog), 0);
    }
}
