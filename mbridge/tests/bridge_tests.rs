//! Integration tests for the upload observer bridge
//!
//! Drives the in-memory coordinator through upload lifecycles and checks
//! what reaches the editor surface:
//! - Mapping of every state, delivered in order, one event per transition
//! - attach/detach idempotence and teardown on drop
//! - Reattach after a surface reload replays the coordinator snapshot
//! - Incomplete successes are downgraded to failures

use mbridge::identity::identity;
use mbridge::{
    EditorSurface, InMemoryCoordinator, ProgressRelay, UploadCoordinator, UploadObserverBridge,
};
use mbridge_common::events::{EventBus, ProgressEvent, UploadPhase};
use mbridge_common::{Asset, DocumentScope, LocalAsset, MediaKind, UploadState};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingSurface {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSurface {
    fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EditorSurface for RecordingSurface {
    fn media_upload_update(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct Fixture {
    coordinator: Arc<InMemoryCoordinator>,
    surface: Arc<RecordingSurface>,
    relay: Arc<ProgressRelay>,
    event_bus: EventBus,
    bridge: UploadObserverBridge,
}

fn fixture() -> Fixture {
    let coordinator = Arc::new(InMemoryCoordinator::new());
    let surface = Arc::new(RecordingSurface::default());
    let event_bus = EventBus::new(100);
    let relay = Arc::new(ProgressRelay::with_surface(surface.clone(), event_bus.clone()));
    let bridge = UploadObserverBridge::new(
        DocumentScope::new(),
        coordinator.clone(),
        relay.clone(),
        event_bus.clone(),
    );
    Fixture {
        coordinator,
        surface,
        relay,
        event_bus,
        bridge,
    }
}

/// Wait until the surface has seen at least `count` events
async fn wait_for_events(surface: &RecordingSurface, count: usize) -> Vec<ProgressEvent> {
    for _ in 0..200 {
        let events = surface.events();
        if events.len() >= count {
            return events;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "expected {} events, surface saw {:?}",
        count,
        surface.events()
    );
}

/// Give the pump task a chance to run
async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

#[tokio::test]
async fn test_full_lifecycle_is_relayed_in_order() {
    let mut f = fixture();
    f.bridge.attach();

    let inserted = f
        .bridge
        .insert_from_device(LocalAsset::new("device-1", MediaKind::Image))
        .expect("insert should succeed");
    let handle = inserted.asset.handle.clone().unwrap();
    let id = inserted.correlation_id;

    f.coordinator.update_state(&handle, UploadState::Processing).unwrap();
    f.coordinator
        .update_state(&handle, UploadState::ThumbnailReady { url: "file:///tmp/t.jpg".to_string() })
        .unwrap();
    f.coordinator
        .update_state(&handle, UploadState::Uploading { progress: 0.5 })
        .unwrap();
    f.coordinator
        .update_state(
            &handle,
            UploadState::Succeeded {
                url: Some("https://media.example/1.jpg".to_string()),
                remote_id: Some(501),
            },
        )
        .unwrap();

    let events = wait_for_events(&f.surface, 5).await;
    assert_eq!(
        events,
        vec![
            ProgressEvent::uploading(id, 0.0, None),
            ProgressEvent::uploading(id, 0.0, None),
            ProgressEvent::uploading(id, 0.0, Some("file:///tmp/t.jpg".to_string())),
            ProgressEvent::uploading(id, 0.5, None),
            ProgressEvent::succeeded(id, "https://media.example/1.jpg".to_string(), 501),
        ]
    );
}

#[tokio::test]
async fn test_correlation_id_matches_identity_of_persisted_asset() {
    let mut f = fixture();
    f.bridge.attach();

    let inserted = f
        .bridge
        .insert_from_device(LocalAsset::new("device-1", MediaKind::Video))
        .unwrap();

    assert_eq!(identity(&inserted.asset).unwrap(), inserted.correlation_id);
    let events = wait_for_events(&f.surface, 1).await;
    assert_eq!(events[0].correlation_id, inserted.correlation_id);
}

#[tokio::test]
async fn test_attach_twice_keeps_single_observer() {
    let mut f = fixture();
    let first = f.bridge.attach();
    let second = f.bridge.attach();

    assert_ne!(first, second);
    assert_eq!(f.bridge.token(), Some(second));
    assert_eq!(f.coordinator.observer_count(f.bridge.scope()), 1);

    // The stale token no longer detaches anything
    assert!(!f.bridge.detach(first));
    assert!(f.bridge.is_attached());
}

#[tokio::test]
async fn test_detach_is_idempotent_and_stops_delivery() {
    let mut f = fixture();
    let token = f.bridge.attach();
    let inserted = f
        .bridge
        .insert_from_device(LocalAsset::new("device-1", MediaKind::Image))
        .unwrap();
    wait_for_events(&f.surface, 1).await;

    assert!(f.bridge.detach(token));
    assert!(!f.bridge.detach(token), "second detach must be a no-op");
    assert_eq!(f.coordinator.observer_count(f.bridge.scope()), 0);

    let handle = inserted.asset.handle.unwrap();
    f.coordinator
        .update_state(&handle, UploadState::Uploading { progress: 0.3 })
        .unwrap();
    settle().await;
    assert_eq!(f.surface.events().len(), 1);
}

#[tokio::test]
async fn test_reattach_if_active() {
    let mut f = fixture();
    assert_eq!(f.bridge.reattach_if_active(), None, "detached bridge stays detached");
    assert_eq!(f.coordinator.observer_count(f.bridge.scope()), 0);

    let first = f.bridge.attach();
    let inserted = f
        .bridge
        .insert_from_device(LocalAsset::new("device-1", MediaKind::Image))
        .unwrap();
    let handle = inserted.asset.handle.unwrap();
    wait_for_events(&f.surface, 1).await;

    // Surface torn down: the next update is dropped, not queued
    f.relay.detach_surface();
    f.coordinator
        .update_state(&handle, UploadState::Uploading { progress: 0.75 })
        .unwrap();
    settle().await;
    assert_eq!(f.surface.events().len(), 1);

    // Surface recreated: reattach replays the current snapshot
    let reloaded = Arc::new(RecordingSurface::default());
    f.relay.attach_surface(reloaded.clone());
    let second = f.bridge.reattach_if_active().expect("bridge was attached");
    assert_ne!(first, second);

    let events = wait_for_events(&reloaded, 1).await;
    assert_eq!(
        events,
        vec![ProgressEvent::uploading(inserted.correlation_id, 0.75, None)]
    );
    assert_eq!(f.coordinator.observer_count(f.bridge.scope()), 1);
}

#[tokio::test]
async fn test_drop_releases_subscription() {
    let f = fixture();
    let coordinator = f.coordinator.clone();
    let scope = f.bridge.scope().clone();
    let mut bridge = f.bridge;

    bridge.attach();
    assert_eq!(coordinator.observer_count(&scope), 1);

    drop(bridge);
    assert_eq!(coordinator.observer_count(&scope), 0);
}

#[tokio::test]
async fn test_incomplete_success_delivered_as_failure() {
    let mut f = fixture();
    let mut diagnostics = f.event_bus.subscribe();
    f.bridge.attach();

    let inserted = f
        .bridge
        .insert_from_device(LocalAsset::new("device-1", MediaKind::Image))
        .unwrap();
    let handle = inserted.asset.handle.unwrap();
    f.coordinator
        .update_state(
            &handle,
            UploadState::Succeeded {
                url: Some("https://media.example/1.jpg".to_string()),
                remote_id: None,
            },
        )
        .unwrap();

    let events = wait_for_events(&f.surface, 2).await;
    assert_eq!(events[1], ProgressEvent::failed(inserted.correlation_id));
    assert!(events.iter().all(|e| e.phase != UploadPhase::Succeeded));

    let mut saw_downgrade = false;
    while let Ok(event) = diagnostics.try_recv() {
        if event.event_type() == "MappingDowngraded" {
            saw_downgrade = true;
        }
    }
    assert!(saw_downgrade, "downgrade should be published on the event bus");
}

#[tokio::test]
async fn test_other_documents_are_not_relayed() {
    let mut f = fixture();
    f.bridge.attach();

    let other_scope = DocumentScope::new();
    f.coordinator
        .add_media(&other_scope, LocalAsset::new("device-9", MediaKind::Image))
        .unwrap();
    settle().await;

    assert!(f.surface.events().is_empty());
}

#[tokio::test]
async fn test_insert_from_library_needs_no_upload() {
    let f = fixture();
    let asset = Asset::from_site_library(
        None,
        MediaKind::Image,
        Some(314),
        Some("https://media.example/314.jpg".to_string()),
    );

    let insert = f.bridge.insert_from_library(&asset);
    assert_eq!(insert.remote_id, Some(314));
    assert_eq!(insert.url.as_deref(), Some("https://media.example/314.jpg"));
    assert_eq!(f.coordinator.observer_count(f.bridge.scope()), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_delivery_starts_after_detach_returns() {
    let mut f = fixture();
    let token = f.bridge.attach();
    let inserted = f
        .bridge
        .insert_from_device(LocalAsset::new("device-1", MediaKind::Image))
        .unwrap();
    let handle = inserted.asset.handle.unwrap();
    wait_for_events(&f.surface, 1).await;

    let coordinator = f.coordinator.clone();
    let producer = std::thread::spawn(move || {
        for step in 0..2000 {
            let progress = step as f64 / 2000.0;
            coordinator
                .update_state(&handle, UploadState::Uploading { progress })
                .unwrap();
        }
    });
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert!(f.bridge.detach(token));
    let seen = f.surface.events().len();

    producer.join().unwrap();
    settle().await;
    assert_eq!(f.surface.events().len(), seen);
}
