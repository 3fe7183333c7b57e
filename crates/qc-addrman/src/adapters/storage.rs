//! File-backed snapshot storage.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::domain::AddressManagerError;
use crate::ports::SnapshotStore;

/// Stores the encoded snapshot in a single file.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// target, so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".new");
        self.path.with_file_name(name)
    }

    fn storage_error(&self, action: &str, err: std::io::Error) -> AddressManagerError {
        AddressManagerError::Storage(format!(
            "failed to {} {}: {}",
            action,
            self.path.display(),
            err
        ))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&self, bytes: &[u8]) -> Result<(), AddressManagerError> {
        let temp = self.temp_path();
        let mut file = File::create(&temp).map_err(|e| self.storage_error("create", e))?;
        file.write_all(bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| self.storage_error("write", e))?;
        fs::rename(&temp, &self.path).map_err(|e| self.storage_error("replace", e))
    }

    fn load(&self) -> Result<Option<Vec<u8>>, AddressManagerError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.storage_error("read", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("peers.dat"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("peers.dat"));
        store.save(b"first").unwrap();
        store.save(b"second").unwrap();
        assert_eq!(store.load().unwrap(), Some(b"second".to_vec()));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_unwritable_location_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("missing").join("peers.dat"));
        assert!(matches!(
            store.save(b"data"),
            Err(AddressManagerError::Storage(_))
        ));
    }
}
