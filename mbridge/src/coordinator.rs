//! Upload coordinator interface and an in-memory implementation
//!
//! The coordinator owns per-asset upload state and drives every transition.
//! Observers register per document scope and receive `(Asset, UploadState)`
//! updates over an unbounded channel, which is how callbacks issued from
//! background work reach the observer's single consuming task.

use mbridge_common::{Asset, DocumentScope, Error, LocalAsset, Result, StorageHandle, UploadState};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Entity name used for storage handles minted by the in-memory coordinator
pub const MEDIA_ENTITY: &str = "Media";

/// Opaque receipt for an observer registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(Uuid);

impl ObserverToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ObserverToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ObserverToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One state transition for one asset
#[derive(Debug, Clone, PartialEq)]
pub struct MediaUpdate {
    pub asset: Asset,
    pub state: UploadState,
}

/// A live observer registration: its token and its update stream
pub struct Observation {
    pub token: ObserverToken,
    pub updates: mpsc::UnboundedReceiver<MediaUpdate>,
}

/// Shared upload coordinator
///
/// Implementations must be callable from any thread. They own the upload
/// state; observers only consume it.
pub trait UploadCoordinator: Send + Sync {
    /// Register an observer for every asset attached to `scope`
    ///
    /// The current state of each asset already in scope is sent first, so a
    /// fresh observer starts from the coordinator's snapshot.
    fn add_observer(&self, scope: &DocumentScope) -> Observation;

    /// Release a registration; unknown tokens are ignored
    fn remove_observer(&self, token: ObserverToken);

    /// Persist a device asset and queue it for upload to `scope`
    fn add_media(&self, scope: &DocumentScope, asset: LocalAsset) -> Result<Asset>;
}

struct TrackedMedia {
    scope: DocumentScope,
    local_identifier: String,
    asset: Asset,
    state: UploadState,
}

struct Registration {
    scope: DocumentScope,
    tx: mpsc::UnboundedSender<MediaUpdate>,
}

#[derive(Default)]
struct CoordinatorInner {
    observers: HashMap<ObserverToken, Registration>,
    /// Append-only: terminal media are kept so later snapshots still report them
    media: Vec<TrackedMedia>,
    next_key: i64,
}

/// Coordinator holding all state in memory
///
/// Used by the demonstration binary and by tests to drive upload lifecycles
/// by hand through [`InMemoryCoordinator::update_state`]. Tracked media are
/// never pruned, so memory grows with every asset added over its lifetime.
pub struct InMemoryCoordinator {
    store_id: Uuid,
    inner: Mutex<CoordinatorInner>,
}

impl InMemoryCoordinator {
    pub fn new() -> Self {
        Self::with_store_id(Uuid::new_v4())
    }

    /// Create a coordinator whose storage handles use a fixed store ID
    pub fn with_store_id(store_id: Uuid) -> Self {
        Self {
            store_id,
            inner: Mutex::new(CoordinatorInner {
                next_key: 1,
                ..Default::default()
            }),
        }
    }

    pub fn store_id(&self) -> Uuid {
        self.store_id
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply a state transition to a tracked asset and notify its observers
    ///
    /// A `Succeeded` state carrying a URL or remote ID also records them on
    /// the asset, so later snapshots report the uploaded identity.
    pub fn update_state(&self, handle: &StorageHandle, state: UploadState) -> Result<()> {
        let mut inner = self.lock();

        let tracked = inner
            .media
            .iter_mut()
            .find(|m| m.asset.handle.as_ref() == Some(handle))
            .ok_or_else(|| Error::InvalidInput(format!("Unknown media: {}", handle)))?;

        if let UploadState::Succeeded { url, remote_id } = &state {
            if url.is_some() {
                tracked.asset.remote_url = url.clone();
            }
            if remote_id.is_some() {
                tracked.asset.remote_id = *remote_id;
            }
        }
        tracked.state = state.clone();

        let update = MediaUpdate {
            asset: tracked.asset.clone(),
            state,
        };
        let scope = tracked.scope.clone();

        debug!(
            "Coordinator: {} -> {} ({} observers)",
            handle,
            update.state.name(),
            inner.observers.len()
        );
        notify(&mut inner, &scope, &update);
        Ok(())
    }

    /// Current state of a tracked asset
    pub fn state_of(&self, handle: &StorageHandle) -> Option<UploadState> {
        self.lock()
            .media
            .iter()
            .find(|m| m.asset.handle.as_ref() == Some(handle))
            .map(|m| m.state.clone())
    }

    /// Device-local identifier of a tracked asset
    pub fn local_identifier_of(&self, handle: &StorageHandle) -> Option<String> {
        self.lock()
            .media
            .iter()
            .find(|m| m.asset.handle.as_ref() == Some(handle))
            .map(|m| m.local_identifier.clone())
    }

    /// Number of observers registered for `scope`
    pub fn observer_count(&self, scope: &DocumentScope) -> usize {
        self.lock()
            .observers
            .values()
            .filter(|r| &r.scope == scope)
            .count()
    }
}

impl Default for InMemoryCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Send an update to every live observer of `scope`, pruning closed ones
fn notify(inner: &mut CoordinatorInner, scope: &DocumentScope, update: &MediaUpdate) {
    inner.observers.retain(|token, registration| {
        if &registration.scope != scope {
            return true;
        }
        if registration.tx.send(update.clone()).is_err() {
            debug!("Coordinator: pruning closed observer {}", token);
            return false;
        }
        true
    });
}

impl UploadCoordinator for InMemoryCoordinator {
    fn add_observer(&self, scope: &DocumentScope) -> Observation {
        let (tx, rx) = mpsc::unbounded_channel();
        let token = ObserverToken::new();
        let mut inner = self.lock();

        for tracked in inner.media.iter().filter(|m| &m.scope == scope) {
            // Receiver is held locally, send cannot fail
            let _ = tx.send(MediaUpdate {
                asset: tracked.asset.clone(),
                state: tracked.state.clone(),
            });
        }

        inner.observers.insert(
            token,
            Registration {
                scope: scope.clone(),
                tx,
            },
        );
        debug!("Coordinator: observer {} added for document {}", token, scope);

        Observation { token, updates: rx }
    }

    fn remove_observer(&self, token: ObserverToken) {
        if self.lock().observers.remove(&token).is_some() {
            debug!("Coordinator: observer {} removed", token);
        }
    }

    fn add_media(&self, scope: &DocumentScope, asset: LocalAsset) -> Result<Asset> {
        if asset.local_identifier.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Local asset identifier must not be empty".to_string(),
            ));
        }

        let mut inner = self.lock();
        let key = inner.next_key;
        inner.next_key += 1;

        let handle = StorageHandle::new(self.store_id, MEDIA_ENTITY, key);
        let persisted = Asset::persisted(handle, asset.kind);
        let update = MediaUpdate {
            asset: persisted.clone(),
            state: UploadState::Queued,
        };

        inner.media.push(TrackedMedia {
            scope: scope.clone(),
            local_identifier: asset.local_identifier,
            asset: persisted.clone(),
            state: UploadState::Queued,
        });
        notify(&mut inner, scope, &update);

        Ok(persisted)
    }
}
