//! Event types for the mbridge event system
//!
//! Provides shared event definitions and the diagnostics EventBus used by
//! the upload bridge, the progress relay and the search throttle.

mod progress_types;
mod search_types;

pub use progress_types::{ProgressEvent, UploadPhase};
pub use search_types::{Suggestion, SuggestionKind};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Diagnostics events
///
/// Events are broadcast via EventBus and can be serialized for logging or
/// forwarding to a developer console. None of them carry control flow: a
/// component never waits on another component's event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayEvent {
    /// Bridge subscribed to a document's upload stream
    ObserverAttached {
        /// Observer registration token
        token: Uuid,
        /// Document the subscription is scoped to
        scope: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Bridge released its subscription
    ObserverDetached {
        token: Uuid,
        scope: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Progress event handed to the editor surface
    ProgressDelivered {
        correlation_id: i64,
        phase: UploadPhase,
        progress: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Progress event dropped because no surface was ready
    ///
    /// Not replayed: the coordinator snapshot is re-observed on reattach.
    ProgressDropped {
        correlation_id: i64,
        phase: UploadPhase,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Coordinator reported success without a usable URL or remote ID
    MappingDowngraded {
        correlation_id: i64,
        /// Which field could not be resolved
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Remote address lookup issued
    LookupIssued {
        request_id: u64,
        query: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Remote address lookup returned suggestions to the caller
    LookupCompleted {
        request_id: u64,
        query: String,
        result_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Remote address lookup failed; surfaced to the caller, not retried
    LookupFailed {
        request_id: u64,
        query: String,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A lookup result arrived after its query was superseded or cancelled
    StaleResultDiscarded {
        request_id: u64,
        query: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl RelayEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            RelayEvent::ObserverAttached { .. } => "ObserverAttached",
            RelayEvent::ObserverDetached { .. } => "ObserverDetached",
            RelayEvent::ProgressDelivered { .. } => "ProgressDelivered",
            RelayEvent::ProgressDropped { .. } => "ProgressDropped",
            RelayEvent::MappingDowngraded { .. } => "MappingDowngraded",
            RelayEvent::LookupIssued { .. } => "LookupIssued",
            RelayEvent::LookupCompleted { .. } => "LookupCompleted",
            RelayEvent::LookupFailed { .. } => "LookupFailed",
            RelayEvent::StaleResultDiscarded { .. } => "StaleResultDiscarded",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central distribution bus for diagnostics events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use mbridge_common::events::{EventBus, RelayEvent, UploadPhase};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(RelayEvent::ProgressDropped {
///     correlation_id: 42,
///     phase: UploadPhase::Uploading,
///     timestamp: chrono::Utc::now(),
/// });
///
/// let received = rx.try_recv().unwrap();
/// assert_eq!(received.event_type(), "ProgressDropped");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RelayEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RelayEvent,
    ) -> Result<usize, broadcast::error::SendError<RelayEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RelayEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_serializes_camel_case() {
        let event = ProgressEvent::succeeded(-17, "https://cdn.example/a.jpg".to_string(), 99);
        let json = serde_json::to_string(&event).expect("Serialization should succeed");

        assert!(json.contains("\"correlationId\":-17"));
        assert!(json.contains("\"phase\":\"succeeded\""));
        assert!(json.contains("\"remoteId\":99"));
        assert!(json.contains("\"progress\":1.0"));
    }

    #[test]
    fn test_progress_event_omits_absent_fields() {
        let event = ProgressEvent::failed(5);
        let json = serde_json::to_string(&event).expect("Serialization should succeed");

        assert!(!json.contains("url"));
        assert!(!json.contains("remoteId"));
    }

    #[test]
    fn test_suggestion_kind_round_trips_through_str() {
        for kind in [
            SuggestionKind::DotComOnly,
            SuggestionKind::IncludeDotBlog,
            SuggestionKind::CustomDomains,
        ] {
            let parsed: SuggestionKind = kind.as_str().parse().expect("kind should parse");
            assert_eq!(parsed, kind);
        }
        assert!("bogus".parse::<SuggestionKind>().is_err());
    }

    #[test]
    fn test_relay_event_tagged_serialization() {
        let event = RelayEvent::LookupIssued {
            request_id: 3,
            query: "abc".to_string(),
            timestamp: chrono::Utc::now(),
        };
        assert_eq!(event.event_type(), "LookupIssued");

        let json = serde_json::to_string(&event).expect("Event serialization should succeed");
        assert!(json.contains("\"type\":\"LookupIssued\""));

        let back: RelayEvent = serde_json::from_str(&json).expect("Event deserialization should succeed");
        match back {
            RelayEvent::LookupIssued { request_id, query, .. } => {
                assert_eq!(request_id, 3);
                assert_eq!(query, "abc");
            }
            _ => panic!("Wrong event type deserialized"),
        }
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_emit_without_subscribers_fails() {
        let bus = EventBus::new(10);
        let result = bus.emit(RelayEvent::ObserverDetached {
            token: Uuid::new_v4(),
            scope: Uuid::new_v4(),
            timestamp: chrono::Utc::now(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_eventbus_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(RelayEvent::ProgressDelivered {
            correlation_id: 1,
            phase: UploadPhase::Uploading,
            progress: 0.25,
            timestamp: chrono::Utc::now(),
        })
        .expect("emit should succeed");

        assert_eq!(rx1.try_recv().expect("rx1 should receive").event_type(), "ProgressDelivered");
        assert_eq!(rx2.try_recv().expect("rx2 should receive").event_type(), "ProgressDelivered");
    }

    #[test]
    fn test_eventbus_emit_lossy_on_full_channel() {
        let bus = EventBus::new(2);
        let _rx = bus.subscribe();

        for i in 0..10 {
            bus.emit_lossy(RelayEvent::StaleResultDiscarded {
                request_id: i,
                query: format!("q{}", i),
                timestamp: chrono::Utc::now(),
            });
        }

        assert_eq!(bus.capacity(), 2);
    }
}
