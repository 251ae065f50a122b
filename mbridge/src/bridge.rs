//! Upload observer bridge
//!
//! Binds one document to the shared upload coordinator and re-emits each
//! `(Asset, UploadState)` transition as a [`ProgressEvent`] through the
//! [`ProgressRelay`].
//!
//! **Architecture:**
//! - `attach()` registers with the coordinator and spawns a pump task
//! - The pump task is the only consumer of the observation stream; every
//!   coordinator callback is marshalled onto it through the channel
//! - Each update is mapped and delivered synchronously, no batching
//! - `detach()` (or dropping the bridge) closes the delivery gate, removes the
//!   registration and stops the pump. A pump still running on another worker
//!   finds the gate closed, so no delivery starts after `detach()` returns
//!
//! Must be used from within a tokio runtime.

use crate::coordinator::{MediaUpdate, Observation, ObserverToken, UploadCoordinator};
use crate::identity;
use crate::relay::ProgressRelay;
use mbridge_common::events::{EventBus, ProgressEvent, RelayEvent};
use mbridge_common::{Asset, DocumentScope, LocalAsset, Result, UploadState};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of mapping one upload state
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub event: ProgressEvent,
    /// Set when a success had to be reported as a failure
    pub downgrade: Option<&'static str>,
}

/// Map an upload state to the editor's progress event
///
/// Total over [`UploadState`]. A success whose URL (falling back to the
/// asset's remote URL) is missing or unparseable, or whose remote ID is
/// missing, is downgraded to `failed`; an incomplete success is never
/// forwarded.
pub fn map_upload_state(correlation_id: i64, asset: &Asset, state: &UploadState) -> Mapping {
    let event = match state {
        UploadState::Queued | UploadState::Processing => {
            ProgressEvent::uploading(correlation_id, 0.0, None)
        }
        UploadState::ThumbnailReady { url } => {
            ProgressEvent::uploading(correlation_id, 0.0, Some(url.clone()))
        }
        UploadState::Uploading { progress } => {
            ProgressEvent::uploading(correlation_id, clamp_progress(*progress), None)
        }
        UploadState::Succeeded { url, remote_id } => {
            let remote_url = url.as_ref().or(asset.remote_url.as_ref());
            let remote_id = remote_id.or(asset.remote_id);

            let reason = match (remote_url, remote_id) {
                (None, _) => Some("missing remote URL"),
                (Some(u), _) if url::Url::parse(u).is_err() => Some("unparseable remote URL"),
                (Some(_), None) => Some("missing remote ID"),
                (Some(u), Some(id)) => {
                    return Mapping {
                        event: ProgressEvent::succeeded(correlation_id, u.clone(), id),
                        downgrade: None,
                    }
                }
            };
            return Mapping {
                event: ProgressEvent::failed(correlation_id),
                downgrade: reason,
            };
        }
        UploadState::Failed => ProgressEvent::failed(correlation_id),
    };

    Mapping {
        event,
        downgrade: None,
    }
}

fn clamp_progress(progress: f64) -> f32 {
    if progress.is_finite() {
        progress.clamp(0.0, 1.0) as f32
    } else {
        0.0
    }
}

/// Identifiers handed to the editor for an item from the site library
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryInsert {
    pub remote_id: Option<i64>,
    pub url: Option<String>,
}

/// A device asset queued for upload
#[derive(Debug, Clone, PartialEq)]
pub struct InsertedMedia {
    /// ID the editor uses for its placeholder until the upload settles
    pub correlation_id: i64,
    pub asset: Asset,
}

/// Open while an observation is current
///
/// The pump holds the lock across each delivery and `release` closes it under
/// the same lock, so once closed no delivery is in progress or can begin.
type DeliveryGate = Arc<Mutex<bool>>;

struct ActiveObservation {
    token: ObserverToken,
    pump: JoinHandle<()>,
    gate: DeliveryGate,
}

/// Bridge between the upload coordinator and one document's editor
pub struct UploadObserverBridge {
    scope: DocumentScope,
    coordinator: Arc<dyn UploadCoordinator>,
    relay: Arc<ProgressRelay>,
    event_bus: EventBus,
    active: Option<ActiveObservation>,
}

impl UploadObserverBridge {
    pub fn new(
        scope: DocumentScope,
        coordinator: Arc<dyn UploadCoordinator>,
        relay: Arc<ProgressRelay>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            scope,
            coordinator,
            relay,
            event_bus,
            active: None,
        }
    }

    pub fn scope(&self) -> &DocumentScope {
        &self.scope
    }

    /// Token of the current subscription, if attached
    pub fn token(&self) -> Option<ObserverToken> {
        self.active.as_ref().map(|a| a.token)
    }

    pub fn is_attached(&self) -> bool {
        self.active.is_some()
    }

    /// Subscribe to the document's upload stream
    ///
    /// Idempotent: an existing subscription is released first.
    pub fn attach(&mut self) -> ObserverToken {
        self.release();

        let Observation { token, updates } = self.coordinator.add_observer(&self.scope);
        let gate: DeliveryGate = Arc::new(Mutex::new(true));
        let pump = tokio::spawn(run_observer_pump(
            updates,
            Arc::clone(&self.relay),
            self.event_bus.clone(),
            Arc::clone(&gate),
        ));
        self.active = Some(ActiveObservation { token, pump, gate });

        info!("Bridge: attached observer {} to document {}", token, self.scope);
        self.event_bus.emit_lossy(RelayEvent::ObserverAttached {
            token: token.as_uuid(),
            scope: self.scope.0,
            timestamp: chrono::Utc::now(),
        });
        token
    }

    /// Release the subscription identified by `token`
    ///
    /// Returns whether anything was released. Repeated calls, or calls with a
    /// token that is no longer current, are no-ops.
    pub fn detach(&mut self, token: ObserverToken) -> bool {
        if self.token() != Some(token) {
            debug!("Bridge: detach({}) ignored, not the current observer", token);
            return false;
        }
        self.release()
    }

    /// Re-subscribe if currently attached
    ///
    /// Used after the editor surface was torn down and recreated: the fresh
    /// subscription starts from the coordinator's current snapshot, so the
    /// editor catches up on whatever it missed.
    pub fn reattach_if_active(&mut self) -> Option<ObserverToken> {
        if self.active.is_some() {
            Some(self.attach())
        } else {
            None
        }
    }

    /// Insert an item that already lives in the site media library
    ///
    /// No upload is involved; the editor receives the remote identifiers
    /// directly.
    pub fn insert_from_library(&self, asset: &Asset) -> LibraryInsert {
        LibraryInsert {
            remote_id: asset.remote_id,
            url: asset.remote_url.clone(),
        }
    }

    /// Queue a device asset for upload to this document
    ///
    /// The returned correlation ID matches the `correlationId` of every
    /// progress event the editor will later receive for this asset.
    pub fn insert_from_device(&self, asset: LocalAsset) -> Result<InsertedMedia> {
        let persisted = self.coordinator.add_media(&self.scope, asset)?;
        let correlation_id = identity::identity(&persisted)?;
        debug!("Bridge: queued device media {} for upload", correlation_id);
        Ok(InsertedMedia {
            correlation_id,
            asset: persisted,
        })
    }

    fn release(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };

        *active.gate.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.coordinator.remove_observer(active.token);
        active.pump.abort();

        info!("Bridge: detached observer {} from document {}", active.token, self.scope);
        self.event_bus.emit_lossy(RelayEvent::ObserverDetached {
            token: active.token.as_uuid(),
            scope: self.scope.0,
            timestamp: chrono::Utc::now(),
        });
        true
    }
}

impl Drop for UploadObserverBridge {
    fn drop(&mut self) {
        self.release();
    }
}

/// Pump task: map and deliver every update of one observation
///
/// Runs until the coordinator drops its sender or the bridge aborts it.
async fn run_observer_pump(
    mut updates: mpsc::UnboundedReceiver<MediaUpdate>,
    relay: Arc<ProgressRelay>,
    event_bus: EventBus,
    gate: DeliveryGate,
) {
    debug!("Bridge: observer pump started");

    while let Some(update) = updates.recv().await {
        if !handle_update(&update, &relay, &event_bus, &gate) {
            break;
        }
    }

    debug!("Bridge: observer pump stopped");
}

/// Map and deliver one update; returns false once the gate is closed
fn handle_update(
    update: &MediaUpdate,
    relay: &ProgressRelay,
    event_bus: &EventBus,
    gate: &Mutex<bool>,
) -> bool {
    let open = gate.lock().unwrap_or_else(PoisonError::into_inner);
    if !*open {
        debug!("Bridge: observer released, dropping {} update", update.state.name());
        return false;
    }

    let correlation_id = match identity::identity(&update.asset) {
        Ok(id) => id,
        Err(e) => {
            warn!("Bridge: skipping {} update: {}", update.state.name(), e);
            return true;
        }
    };

    let mapping = map_upload_state(correlation_id, &update.asset, &update.state);

    if let Some(reason) = mapping.downgrade {
        warn!(
            "Bridge: upload {} reported success with {}, reporting failure",
            correlation_id, reason
        );
        event_bus.emit_lossy(RelayEvent::MappingDowngraded {
            correlation_id,
            reason: reason.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }

    relay.deliver(&mapping.event);
    true
}
