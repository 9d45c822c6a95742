//! Byte-level storage backends

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::{fs, io};

use thiserror::Error;

/// Where named blobs (scores, settings) are kept.
pub trait FileStorage {
    /// Returns `Ok(None)` when nothing has been stored under `name` yet.
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is unavailable")]
    Unavailable,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Files under a base directory on the local disk.
#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
}

impl LocalFileStorage {
    /// Environment variable that overrides the data directory
    pub const DATA_DIR_ENV: &'static str = "MINI_GAMES_DATA_DIR";

    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Platform application-data directory, overridable via `MINI_GAMES_DATA_DIR`
    pub fn default_base_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(Self::DATA_DIR_ENV) {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            if let Some(home) = std::env::var_os("HOME") {
                return PathBuf::from(home).join("Library/Application Support/MiniGames");
            }
        }
        #[cfg(target_os = "linux")]
        {
            if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
                return PathBuf::from(xdg).join("mini-games");
            }
            if let Some(home) = std::env::var_os("HOME") {
                return PathBuf::from(home).join(".local/share/mini-games");
            }
        }
        #[cfg(target_os = "windows")]
        {
            if let Some(local) = std::env::var_os("LOCALAPPDATA") {
                return PathBuf::from(local).join("MiniGames");
            }
            if let Some(roam) = std::env::var_os("APPDATA") {
                return PathBuf::from(roam).join("MiniGames");
            }
        }
        PathBuf::from("./MiniGames")
    }

    pub fn default_dir() -> Self {
        Self::new(Self::default_base_dir())
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }
}

impl FileStorage for LocalFileStorage {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a half-written file
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, bytes)?;
        if let Err(err) = fs::rename(&tmp, &path) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                log::warn!("Could not remove {}: {cleanup}", tmp.display());
            }
            return Err(err.into());
        }
        Ok(())
    }
}

/// In-memory storage. Clones share the same contents.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    files: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    fail_writes: Rc<Cell<bool>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail with `StorageError::Unavailable`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Overwrite a blob directly, bypassing the failure switch
    pub fn put(&self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.files.borrow_mut().insert(name.to_string(), bytes.into());
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(name).cloned()
    }
}

impl FileStorage for MemoryStorage {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.get(name))
    }

    fn save(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::Unavailable);
        }
        self.put(name, bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_dir(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!(
            "mini-games-{}-{}-{}",
            tag,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn test_local_storage_missing_file_is_none() {
        let storage = LocalFileStorage::new(scratch_dir("missing"));
        assert!(storage.load("scores.json").unwrap().is_none());
    }

    #[test]
    fn test_local_storage_save_and_load() {
        let dir = scratch_dir("roundtrip");
        let storage = LocalFileStorage::new(&dir);
        storage.save("scores.json", b"[1,2,3]").unwrap();
        assert_eq!(storage.load("scores.json").unwrap().unwrap(), b"[1,2,3]");
        // Temp file is renamed away
        assert!(!dir.join("scores.json.tmp").exists());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = scratch_dir("blocked");
        // A non-empty directory where the file should go makes the rename fail
        fs::create_dir_all(dir.join("scores.json")).unwrap();
        fs::write(dir.join("scores.json").join("keep"), b"x").unwrap();

        let storage = LocalFileStorage::new(&dir);
        assert!(matches!(
            storage.save("scores.json", b"[1]"),
            Err(StorageError::Io(_))
        ));
        assert!(!dir.join("scores.json.tmp").exists());
        assert!(dir.join("scores.json").join("keep").exists());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_memory_storage_shares_contents_and_fails_on_demand() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage.save("a", b"x").unwrap();
        assert_eq!(other.get("a").unwrap(), b"x");

        other.set_fail_writes(true);
        assert!(matches!(
            storage.save("a", b"y"),
            Err(StorageError::Unavailable)
        ));
        assert_eq!(storage.get("a").unwrap(), b"x");
    }
}
