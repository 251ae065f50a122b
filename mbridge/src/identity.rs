//! Correlation identity for local assets
//!
//! The editor only knows media by a numeric ID. It is derived from the
//! canonical URI of the asset's storage handle: the first eight bytes of its
//! SHA-256 digest, read big-endian as `i64`. The value is recomputed on
//! every call and never cached, so it is stable exactly as long as the
//! storage record is.

use mbridge_common::{Asset, Error, Result, StorageHandle};
use sha2::{Digest, Sha256};

/// Correlation ID for a storage handle
pub fn identity_for_handle(handle: &StorageHandle) -> i64 {
    let digest = Sha256::digest(handle.uri().as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(prefix)
}

/// Correlation ID for an asset
///
/// The asset must have been persisted first; an asset without a storage
/// handle has no identity and yields [`Error::Resolution`].
pub fn identity(asset: &Asset) -> Result<i64> {
    asset
        .handle
        .as_ref()
        .map(identity_for_handle)
        .ok_or_else(|| {
            Error::Resolution(format!(
                "{} asset has no storage handle (not persisted)",
                asset.kind
            ))
        })
}
