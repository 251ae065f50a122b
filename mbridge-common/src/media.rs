//! Media item and upload state definitions
//!
//! An [`Asset`] is a locally selected media item: a device photo/video or an
//! item already present in the site media library. Upload state transitions
//! are produced by an upload coordinator and only consumed here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// URI scheme for canonical storage handle strings
pub const STORAGE_URI_SCHEME: &str = "x-mbridge";

/// Persistent storage identity of a media record
///
/// The canonical string form (see [`StorageHandle::uri`]) is what the
/// correlation identity is derived from, so two handles that compare equal
/// always produce the same correlation ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageHandle {
    /// Identifier of the persistent store holding the record
    pub store_id: Uuid,
    /// Entity (table) name, e.g. "Media"
    pub entity: String,
    /// Primary key of the record within the entity
    pub key: i64,
}

impl StorageHandle {
    pub fn new(store_id: Uuid, entity: impl Into<String>, key: i64) -> Self {
        Self {
            store_id,
            entity: entity.into(),
            key,
        }
    }

    /// Canonical URI representation: `x-mbridge://<store>/<entity>/p<key>`
    pub fn uri(&self) -> String {
        format!(
            "{}://{}/{}/p{}",
            STORAGE_URI_SCHEME,
            self.store_id.as_hyphenated(),
            self.entity,
            self.key
        )
    }
}

impl std::fmt::Display for StorageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri())
    }
}

/// Kind of media carried by an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Other => write!(f, "other"),
        }
    }
}

/// Where an asset was picked from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    /// Photo/video from the device library; must be uploaded
    DeviceLibrary,
    /// Item already uploaded to the site media library
    SiteLibrary,
}

/// A device asset picked by the user, before the coordinator persists it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalAsset {
    /// Device-local identifier of the picked asset
    pub local_identifier: String,
    pub kind: MediaKind,
}

impl LocalAsset {
    pub fn new(local_identifier: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            local_identifier: local_identifier.into(),
            kind,
        }
    }
}

/// A media item known to the host application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Persistent storage handle; `None` until the record is saved
    pub handle: Option<StorageHandle>,
    pub kind: MediaKind,
    pub source: MediaSource,
    /// Remote URL once uploaded
    pub remote_url: Option<String>,
    /// Remote numeric ID once uploaded
    pub remote_id: Option<i64>,
}

impl Asset {
    /// A device asset backed by a persisted record, not yet uploaded
    pub fn persisted(handle: StorageHandle, kind: MediaKind) -> Self {
        Self {
            handle: Some(handle),
            kind,
            source: MediaSource::DeviceLibrary,
            remote_url: None,
            remote_id: None,
        }
    }

    /// An item already present in the site media library
    pub fn from_site_library(
        handle: Option<StorageHandle>,
        kind: MediaKind,
        remote_id: Option<i64>,
        remote_url: Option<String>,
    ) -> Self {
        Self {
            handle,
            kind,
            source: MediaSource::SiteLibrary,
            remote_url,
            remote_id,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.handle.is_some()
    }
}

/// Per-asset upload state reported by the upload coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadState {
    /// Waiting for an upload slot
    Queued,
    /// Being exported / prepared locally
    Processing,
    /// A local thumbnail is available at `url`
    ThumbnailReady { url: String },
    /// Upload in progress; `progress` in 0.0..=1.0
    Uploading { progress: f64 },
    /// Upload finished; fields fall back to the asset's own remote URL/ID
    Succeeded {
        url: Option<String>,
        remote_id: Option<i64>,
    },
    /// Upload failed
    Failed,
}

impl UploadState {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            UploadState::Queued => "queued",
            UploadState::Processing => "processing",
            UploadState::ThumbnailReady { .. } => "thumbnail-ready",
            UploadState::Uploading { .. } => "uploading",
            UploadState::Succeeded { .. } => "succeeded",
            UploadState::Failed => "failed",
        }
    }

    /// Whether no further transitions are expected for the asset
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Succeeded { .. } | UploadState::Failed)
    }
}

/// The document (post) that scopes an upload observation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentScope(pub Uuid);

impl DocumentScope {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentScope {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
