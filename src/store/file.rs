use super::{decode_or_empty, encode, RegistryStore};
use crate::error::StoreError;
use crate::Registry;
use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Registry store backed by a single JSON file, shared by every process that
/// points at the same path.
pub struct FileStore {
    path: PathBuf,
    // Bytes this handle last read or wrote; anything else on disk is remote.
    observed: Mutex<Option<String>>,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            observed: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn observe(&self, content: Option<String>) {
        *self.observed.lock().unwrap_or_else(|e| e.into_inner()) = content;
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "registry".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
    }
}

impl RegistryStore for FileStore {
    fn read(&self) -> Result<Registry, StoreError> {
        let content = self.load()?;
        let registry = content
            .as_deref()
            .map(decode_or_empty)
            .unwrap_or_default();
        self.observe(content);
        Ok(registry)
    }

    fn write(&self, registry: &Registry) -> Result<(), StoreError> {
        let payload = encode(registry)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Readers in other processes must never see a half-written file.
        let temp = self.temp_path();
        std::fs::write(&temp, &payload)?;
        std::fs::rename(&temp, &self.path)?;

        self.observe(Some(payload));
        Ok(())
    }

    fn take_remote_change(&self) -> bool {
        let current = match self.load() {
            Ok(content) => content,
            Err(e) => {
                debug!("Could not poll registry file {:?}: {}", self.path, e);
                return false;
            }
        };

        let mut observed = self.observed.lock().unwrap_or_else(|e| e.into_inner());
        if *observed == current {
            false
        } else {
            *observed = current;
            true
        }
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.observe(None);
        Ok(())
    }
}
