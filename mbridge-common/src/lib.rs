//! # mbridge Common Library
//!
//! Shared code for the editor media bridge and address search:
//! - Media and upload state types
//! - Progress and suggestion event types (RelayEvent enum)
//! - EventBus for diagnostics broadcasting
//! - Configuration loading
//! - Error types

pub mod config;
pub mod error;
pub mod events;
pub mod media;

pub use error::{Error, Result};
pub use events::{EventBus, ProgressEvent, RelayEvent, Suggestion, SuggestionKind, UploadPhase};
pub use media::{Asset, DocumentScope, LocalAsset, MediaKind, MediaSource, StorageHandle, UploadState};
