//! mbridge library - editor media bridge and address search
//!
//! - [`identity`]: correlation IDs for local assets
//! - [`coordinator`]: upload coordinator interface (+ in-memory coordinator)
//! - [`bridge`]: per-document upload observer bridge
//! - [`relay`]: progress relay to the embedded editor surface
//! - [`search`]: throttled incremental address search

pub mod bridge;
pub mod coordinator;
pub mod identity;
pub mod relay;
pub mod search;

pub use bridge::{map_upload_state, InsertedMedia, LibraryInsert, Mapping, UploadObserverBridge};
pub use coordinator::{InMemoryCoordinator, MediaUpdate, Observation, ObserverToken, UploadCoordinator};
pub use relay::{ChannelSurface, Delivery, EditorSurface, ProgressRelay, ScriptMessage};
pub use search::{AddressLookup, SearchOutcome, SearchThrottle, ThrottleConfig};
