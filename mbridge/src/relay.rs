//! Progress relay: the single point of contact with the editor surface
//!
//! Delivery is synchronous and unbuffered. When no surface is attached, or
//! the attached one reports it is not ready (e.g. its web view is being
//! reloaded), the event is dropped rather than queued. Recovery happens by
//! re-observing the coordinator's current state, see
//! [`crate::bridge::UploadObserverBridge::reattach_if_active`].

use mbridge_common::events::{EventBus, ProgressEvent, RelayEvent};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Name of the inbound call exposed by the editor surface
pub const MEDIA_UPLOAD_UPDATE: &str = "mediaUploadUpdate";

/// Embedded editor surface receiving upload progress
///
/// Calls are idempotent; only the latest event per correlation ID matters.
pub trait EditorSurface: Send + Sync {
    fn media_upload_update(&self, event: &ProgressEvent);

    /// Whether the surface can accept calls right now
    fn is_ready(&self) -> bool {
        true
    }
}

/// Result of a delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Dropped,
}

/// Forwards progress events to the currently attached surface
pub struct ProgressRelay {
    surface: RwLock<Option<Arc<dyn EditorSurface>>>,
    event_bus: EventBus,
}

impl ProgressRelay {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            surface: RwLock::new(None),
            event_bus,
        }
    }

    /// Create a relay with a surface already attached
    pub fn with_surface(surface: Arc<dyn EditorSurface>, event_bus: EventBus) -> Self {
        Self {
            surface: RwLock::new(Some(surface)),
            event_bus,
        }
    }

    /// Attach (or replace) the editor surface
    pub fn attach_surface(&self, surface: Arc<dyn EditorSurface>) {
        *self.surface.write().unwrap_or_else(|p| p.into_inner()) = Some(surface);
        debug!("Relay: surface attached");
    }

    /// Forget the surface; later deliveries are dropped
    pub fn detach_surface(&self) {
        *self.surface.write().unwrap_or_else(|p| p.into_inner()) = None;
        debug!("Relay: surface detached");
    }

    /// Whether a surface is attached and ready
    pub fn is_ready(&self) -> bool {
        self.current_surface().is_some_and(|s| s.is_ready())
    }

    fn current_surface(&self) -> Option<Arc<dyn EditorSurface>> {
        self.surface
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Hand one event to the surface, or drop it
    pub fn deliver(&self, event: &ProgressEvent) -> Delivery {
        let timestamp = chrono::Utc::now();

        match self.current_surface() {
            Some(surface) if surface.is_ready() => {
                surface.media_upload_update(event);
                debug!(
                    "Relay: delivered {} {} ({:.2})",
                    event.correlation_id, event.phase, event.progress
                );
                self.event_bus.emit_lossy(RelayEvent::ProgressDelivered {
                    correlation_id: event.correlation_id,
                    phase: event.phase,
                    progress: event.progress,
                    timestamp,
                });
                Delivery::Delivered
            }
            _ => {
                debug!(
                    "Relay: surface not ready, dropping {} {}",
                    event.correlation_id, event.phase
                );
                self.event_bus.emit_lossy(RelayEvent::ProgressDropped {
                    correlation_id: event.correlation_id,
                    phase: event.phase,
                    timestamp,
                });
                Delivery::Dropped
            }
        }
    }
}

/// Message posted to an embedded web editor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptMessage {
    /// Handler name on the editor side
    pub name: &'static str,
    /// JSON body
    pub body: String,
}

/// Surface that posts each update as a JSON script message on a channel
///
/// Ready while the receiving end (the editor's message pump) is alive.
pub struct ChannelSurface {
    tx: mpsc::UnboundedSender<ScriptMessage>,
}

impl ChannelSurface {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ScriptMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EditorSurface for ChannelSurface {
    fn media_upload_update(&self, event: &ProgressEvent) {
        let body = match serde_json::to_string(event) {
            Ok(body) => body,
            Err(e) => {
                warn!("Relay: failed to encode {} message: {}", MEDIA_UPLOAD_UPDATE, e);
                return;
            }
        };

        if self
            .tx
            .send(ScriptMessage {
                name: MEDIA_UPLOAD_UPDATE,
                body,
            })
            .is_err()
        {
            debug!("Relay: editor message pump gone");
        }
    }

    fn is_ready(&self) -> bool {
        !self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbridge_common::UploadPhase;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSurface {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl EditorSurface for RecordingSurface {
        fn media_upload_update(&self, event: &ProgressEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_deliver_without_surface_drops() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let relay = ProgressRelay::new(bus);

        assert!(!relay.is_ready());
        assert_eq!(relay.deliver(&ProgressEvent::failed(1)), Delivery::Dropped);
        assert_eq!(rx.try_recv().unwrap().event_type(), "ProgressDropped");
    }

    #[test]
    fn test_deliver_to_attached_surface() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let relay = ProgressRelay::new(bus);
        let surface = Arc::new(RecordingSurface::default());
        relay.attach_surface(surface.clone());

        let event = ProgressEvent::uploading(9, 0.4, None);
        assert_eq!(relay.deliver(&event), Delivery::Delivered);
        assert_eq!(surface.events.lock().unwrap().as_slice(), &[event]);
        assert_eq!(rx.try_recv().unwrap().event_type(), "ProgressDelivered");
    }

    #[test]
    fn test_detach_surface_drops_later_events() {
        let relay = ProgressRelay::new(EventBus::new(10));
        let surface = Arc::new(RecordingSurface::default());
        relay.attach_surface(surface.clone());
        relay.detach_surface();

        assert_eq!(relay.deliver(&ProgressEvent::failed(2)), Delivery::Dropped);
        assert!(surface.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_channel_surface_posts_json() {
        let (surface, mut rx) = ChannelSurface::new();
        let relay = ProgressRelay::with_surface(Arc::new(surface), EventBus::new(10));

        relay.deliver(&ProgressEvent::succeeded(5, "https://cdn.example/5.png".to_string(), 12));

        let message = rx.try_recv().unwrap();
        assert_eq!(message.name, MEDIA_UPLOAD_UPDATE);
        let decoded: ProgressEvent = serde_json::from_str(&message.body).unwrap();
        assert_eq!(decoded.phase, UploadPhase::Succeeded);
        assert_eq!(decoded.remote_id, Some(12));
    }

    #[test]
    fn test_channel_surface_not_ready_after_receiver_dropped() {
        let (surface, rx) = ChannelSurface::new();
        let relay = ProgressRelay::with_surface(Arc::new(surface), EventBus::new(10));
        drop(rx);

        assert!(!relay.is_ready());
        assert_eq!(relay.deliver(&ProgressEvent::failed(3)), Delivery::Dropped);
    }
}
