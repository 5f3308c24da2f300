//! Adapters over the shared key that holds the serialized [`Registry`].
//!
//! Every window owns its own handle. A write made through one handle is
//! reported by [`RegistryStore::take_remote_change`] on every other handle and
//! never on the writer's.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::Registry;
use log::warn;

pub trait RegistryStore {
    /// Loads the persisted registry. An absent or corrupt payload reads as an
    /// empty registry; only an unreachable store is an error.
    fn read(&self) -> Result<Registry, StoreError>;

    /// Replaces the persisted registry wholesale. Last writer wins.
    fn write(&self, registry: &Registry) -> Result<(), StoreError>;

    /// Returns `true` once per change made by some other handle since the
    /// previous call. Never blocks.
    fn take_remote_change(&self) -> bool;

    /// Removes the shared key entirely.
    fn clear(&self) -> Result<(), StoreError>;
}

pub fn encode(registry: &Registry) -> Result<String, StoreError> {
    Ok(serde_json::to_string(registry)?)
}

pub fn decode(payload: &str) -> Result<Registry, StoreError> {
    let mut registry: Registry = serde_json::from_str(payload)?;
    registry.normalize();
    Ok(registry)
}

/// Decodes `payload`, treating a corrupt payload as an empty registry.
pub(crate) fn decode_or_empty(payload: &str) -> Registry {
    match decode(payload) {
        Ok(registry) => registry,
        Err(e) => {
            warn!("Discarding unreadable registry payload: {}", e);
            Registry::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn decode_rejects_garbage() {
        assert_matches!(decode("{not json"), Err(StoreError::Corrupt(_)));
        assert_matches!(decode("42"), Err(StoreError::Corrupt(_)));
    }

    #[test]
    fn corrupt_payload_reads_as_empty() {
        assert!(decode_or_empty("definitely not a registry").is_empty());
    }

    #[test]
    fn missing_fields_default() {
        let registry = decode("{}").unwrap();
        assert_eq!(registry, Registry::default());
    }
}
