//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.  Publishing never waits, which is what lets the gate publish
//! from inside its critical section.
//!
//! # Topics
//!
//! | Topic | Traffic |
//! |---|---|
//! | [`Topic::VehicleCmd`] | Merged command snapshots, one per accepted fragment |
//! | [`Topic::EmergencyStop`] | Emergency flag, every watchdog tick while engaged |
//! | [`Topic::CtrlMode`] | Control-mode name on every mode change |

use tokio::sync::broadcast;
use tracing::warn;
use twistgate_types::{Event, EventPayload, GateError};

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
pub const DEFAULT_CAPACITY: usize = 256;

/// The output lanes of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    VehicleCmd,
    EmergencyStop,
    CtrlMode,
}

impl Topic {
    /// Every topic, in a stable order.
    pub const ALL: [Topic; 3] = [Topic::VehicleCmd, Topic::EmergencyStop, Topic::CtrlMode];

    /// The lane a payload belongs on.
    pub fn for_payload(payload: &EventPayload) -> Self {
        match payload {
            EventPayload::VehicleCmd(_) => Topic::VehicleCmd,
            EventPayload::EmergencyStop(_) => Topic::EmergencyStop,
            EventPayload::CtrlMode(_) => Topic::CtrlMode,
        }
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    vehicle_cmd: broadcast::Sender<Event>,
    emergency_stop: broadcast::Sender<Event>,
    ctrl_mode: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero (a [`broadcast::channel`] requirement).
    pub fn new(capacity: usize) -> Self {
        let (vehicle_cmd, _) = broadcast::channel(capacity);
        let (emergency_stop, _) = broadcast::channel(capacity);
        let (ctrl_mode, _) = broadcast::channel(capacity);
        Self {
            vehicle_cmd,
            emergency_stop,
            ctrl_mode,
        }
    }

    /// Publish `event` on the topic matching its payload.
    ///
    /// Returns the number of active receivers that were handed the event.
    /// Returns `Ok(0)` when no subscribers are currently listening on the
    /// topic (this is a normal condition, not an error).
    pub fn publish(&self, event: Event) -> Result<usize, GateError> {
        let topic = Topic::for_payload(&event.payload);
        // `send` only fails when there are no receivers.
        Ok(self.topic_sender(topic).send(event).unwrap_or(0))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of receivers currently subscribed to `topic`.
    pub fn receiver_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::VehicleCmd => &self.vehicle_cmd,
            Topic::EmergencyStop => &self.emergency_stop,
            Topic::CtrlMode => &self.ctrl_mode,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.  The caller decides whether to
    ///   continue or abort.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Wait for the next event, skipping over lag.
    ///
    /// Returns `None` once the bus is closed.
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "topic receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
