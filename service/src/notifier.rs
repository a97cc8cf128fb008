//! Real-time fan-out to connected clients.
//!
//! Events are pushed to scoped channels — one per counter, doctor or
//! technician — plus an unscoped broadcast channel. A subset of scoped
//! events is mirrored onto the broadcast channel so a dashboard can follow
//! aggregate state without subscribing to every scope individually.
//!
//! Membership is live: a scope "has subscribers" exactly while at least one
//! receiver is held, and dropping the receiver (client disconnect) removes
//! the membership with it.

use chrono::{DateTime, Utc};
use frontdesk_core::clock::Clock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// A delivery scope: one room of subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Clients watching one counter.
    Counter(String),
    /// Clients watching one doctor's queue.
    Doctor(String),
    /// Clients watching one technician's queue.
    Technician(String),
    /// Everyone.
    Broadcast,
}

impl Scope {
    fn channel_name(&self) -> String {
        match self {
            Self::Counter(id) => format!("counter:{id}"),
            Self::Doctor(id) => format!("doctor:{id}"),
            Self::Technician(id) => format!("technician:{id}"),
            Self::Broadcast => "broadcast".to_string(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.channel_name())
    }
}

/// Kinds of events pushed to clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A new ticket was issued to a counter.
    #[serde(rename = "NEW_TICKET")]
    TicketIssued,
    /// The consumer finished processing an issued ticket.
    #[serde(rename = "TICKET_PROCESSED")]
    TicketProcessed,
    /// A ticket was called to its counter.
    #[serde(rename = "TICKET_CALLED")]
    TicketCalled,
    /// A ticket's lifecycle status changed.
    #[serde(rename = "TICKET_STATUS")]
    TicketStatusChanged,
    /// A queue item joined a counter's queue.
    #[serde(rename = "QUEUE_ITEM_ADDED")]
    QueueItemAdded,
    /// A queue item's status changed.
    #[serde(rename = "QUEUE_ITEM_STATUS")]
    QueueItemStatusChanged,
    /// A queue item left the queue.
    #[serde(rename = "QUEUE_ITEM_REMOVED")]
    QueueItemRemoved,
    /// Positions were recomputed for a whole queue.
    #[serde(rename = "QUEUE_POSITIONS")]
    QueuePositionsRefreshed,
    /// A counter went online/offline or was cleared.
    #[serde(rename = "COUNTER_STATUS")]
    CounterStatusChanged,
}

impl EventKind {
    /// Whether scoped deliveries of this kind are mirrored to broadcast.
    ///
    /// Processed-ticket traffic and counter state make up the aggregate
    /// dashboard view; the issuance ping and per-item queue churn stay
    /// scoped to their counter.
    #[must_use]
    pub const fn mirrored(self) -> bool {
        matches!(
            self,
            Self::TicketProcessed
                | Self::TicketCalled
                | Self::TicketStatusChanged
                | Self::CounterStatusChanged
        )
    }
}

/// The event envelope every subscriber receives.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Event payload.
    pub data: serde_json::Value,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
}

/// Fan-out hub over tokio broadcast channels.
pub struct Notifier {
    channels: RwLock<HashMap<String, broadcast::Sender<Envelope>>>,
    clock: Arc<dyn Clock>,
    capacity: usize,
}

impl Notifier {
    /// Create a notifier. `capacity` bounds the per-scope event buffer; a
    /// subscriber that lags further than that starts losing oldest events.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            clock,
            capacity,
        }
    }

    /// Join a scope. The returned receiver is the membership: dropping it
    /// leaves the scope.
    pub fn subscribe(&self, scope: &Scope) -> broadcast::Receiver<Envelope> {
        let name = scope.channel_name();
        if let Ok(channels) = self.channels.read() {
            if let Some(sender) = channels.get(&name) {
                return sender.subscribe();
            }
        }

        match self.channels.write() {
            Ok(mut channels) => channels
                .entry(name)
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe(),
            // Lock poisoned: hand back a channel nobody publishes to rather
            // than propagating a panic into the caller.
            Err(_) => {
                let (_tx, rx) = broadcast::channel(self.capacity);
                rx
            }
        }
    }

    /// Publish an event to a scope, mirroring to broadcast when the kind
    /// calls for it. Delivery is best-effort: scopes without subscribers
    /// drop the event silently.
    pub fn publish(&self, scope: &Scope, kind: EventKind, data: serde_json::Value) {
        let envelope = Envelope {
            kind,
            data,
            timestamp: self.clock.now(),
        };

        self.send(scope, envelope.clone());
        if kind.mirrored() && *scope != Scope::Broadcast {
            self.send(&Scope::Broadcast, envelope);
        }
    }

    fn send(&self, scope: &Scope, envelope: Envelope) {
        let name = scope.channel_name();
        if let Ok(channels) = self.channels.read() {
            if let Some(sender) = channels.get(&name) {
                // An Err here only means no live receivers.
                let delivered = sender.send(envelope);
                tracing::trace!(
                    scope = %scope,
                    delivered = delivered.map_or(0, |n| n),
                    "Event published"
                );
            }
        }
    }

    /// Live subscriber count for a scope.
    #[must_use]
    pub fn subscriber_count(&self, scope: &Scope) -> usize {
        self.channels
            .read()
            .ok()
            .and_then(|channels| {
                channels
                    .get(&scope.channel_name())
                    .map(broadcast::Sender::receiver_count)
            })
            .unwrap_or(0)
    }

    /// Whether anyone is connected to a counter's scope — the "is this
    /// counter's screen online" query.
    #[must_use]
    pub fn is_scope_online(&self, scope: &Scope) -> bool {
        self.subscriber_count(scope) > 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Panics: tests assert on channel results
mod tests {
    use super::*;
    use frontdesk_core::clock::SystemClock;
    use serde_json::json;

    fn notifier() -> Notifier {
        Notifier::new(Arc::new(SystemClock), 16)
    }

    #[tokio::test]
    async fn scoped_delivery_reaches_subscriber() {
        let notifier = notifier();
        let scope = Scope::Counter("c-1".into());
        let mut rx = notifier.subscribe(&scope);

        notifier.publish(&scope, EventKind::QueueItemAdded, json!({"seq": 1}));

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.kind, EventKind::QueueItemAdded);
        assert_eq!(envelope.data, json!({"seq": 1}));
    }

    #[tokio::test]
    async fn mirrored_kinds_reach_broadcast() {
        let notifier = notifier();
        let mut broadcast_rx = notifier.subscribe(&Scope::Broadcast);

        notifier.publish(
            &Scope::Counter("c-1".into()),
            EventKind::TicketProcessed,
            json!({"queue_number": "A-001"}),
        );

        let envelope = broadcast_rx.recv().await.unwrap();
        assert_eq!(envelope.kind, EventKind::TicketProcessed);
    }

    #[tokio::test]
    async fn unmirrored_kinds_stay_scoped() {
        let notifier = notifier();
        let mut broadcast_rx = notifier.subscribe(&Scope::Broadcast);

        notifier.publish(
            &Scope::Counter("c-1".into()),
            EventKind::QueueItemAdded,
            json!({}),
        );
        // Nothing mirrored: the broadcast channel stays empty.
        assert!(matches!(
            broadcast_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn membership_follows_receiver_lifetime() {
        let notifier = notifier();
        let scope = Scope::Counter("c-1".into());
        assert!(!notifier.is_scope_online(&scope));

        let rx = notifier.subscribe(&scope);
        assert!(notifier.is_scope_online(&scope));
        assert_eq!(notifier.subscriber_count(&scope), 1);

        drop(rx);
        assert!(!notifier.is_scope_online(&scope));
    }

    #[test]
    fn envelope_serializes_with_type_tag() {
        let envelope = Envelope {
            kind: EventKind::TicketIssued,
            data: json!({"x": 1}),
            timestamp: SystemClock.now(),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["type"], "NEW_TICKET");
        assert_eq!(value["data"]["x"], 1);
    }
}
