use super::{decode_or_empty, encode, RegistryStore};
use crate::error::StoreError;
use crate::Registry;
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

struct Shared {
    payload: Option<String>,
    available: bool,
    writable: bool,
    pending: HashMap<u64, bool>,
    next_origin: u64,
}

impl Shared {
    fn register(&mut self) -> u64 {
        let origin = self.next_origin;
        self.next_origin += 1;
        self.pending.insert(origin, false);
        origin
    }

    fn mark_changed(&mut self, writer: Option<u64>) {
        for (origin, pending) in self.pending.iter_mut() {
            if Some(*origin) != writer {
                *pending = true;
            }
        }
    }
}

/// In-process registry store. Handles obtained through [`MemoryStore::connect`]
/// share one payload and behave like sibling windows.
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
    origin: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut shared = Shared {
            payload: None,
            available: true,
            writable: true,
            pending: HashMap::new(),
            next_origin: 0,
        };
        let origin = shared.register();
        Self {
            shared: Arc::new(Mutex::new(shared)),
            origin,
        }
    }

    /// Opens another handle onto the same payload.
    pub fn connect(&self) -> Self {
        let origin = self.lock().register();
        Self {
            shared: Arc::clone(&self.shared),
            origin,
        }
    }

    /// Simulates the store being disabled or failing for every handle.
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Makes writes fail while reads keep working, like a full quota.
    pub fn set_writable(&self, writable: bool) {
        self.lock().writable = writable;
    }

    /// Writes `payload` as an outside party, notifying every handle.
    pub fn put_raw(&self, payload: &str) {
        let mut shared = self.lock();
        shared.payload = Some(payload.to_string());
        shared.mark_changed(None);
    }

    pub fn raw(&self) -> Option<String> {
        self.lock().payload.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_available(shared: &Shared) -> Result<(), StoreError> {
        if shared.available {
            Ok(())
        } else {
            Err(StoreError::Unavailable(io::Error::other(
                "memory store disabled",
            )))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MemoryStore {
    fn drop(&mut self) {
        let origin = self.origin;
        self.lock().pending.remove(&origin);
    }
}

impl RegistryStore for MemoryStore {
    fn read(&self) -> Result<Registry, StoreError> {
        let shared = self.lock();
        Self::ensure_available(&shared)?;
        Ok(shared
            .payload
            .as_deref()
            .map(decode_or_empty)
            .unwrap_or_default())
    }

    fn write(&self, registry: &Registry) -> Result<(), StoreError> {
        let payload = encode(registry)?;
        let mut shared = self.lock();
        Self::ensure_available(&shared)?;
        if !shared.writable {
            return Err(StoreError::Unavailable(io::Error::other(
                "memory store is read-only",
            )));
        }
        shared.payload = Some(payload);
        shared.mark_changed(Some(self.origin));
        Ok(())
    }

    fn take_remote_change(&self) -> bool {
        let mut shared = self.lock();
        if !shared.available {
            return false;
        }
        shared
            .pending
            .insert(self.origin, false)
            .unwrap_or(false)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut shared = self.lock();
        Self::ensure_available(&shared)?;
        shared.payload = None;
        shared.mark_changed(Some(self.origin));
        Ok(())
    }
}
