//! # JSON File Store
//!
//! Layout: `<root>/<collection>/<key>.json`, one record per file.
//!
//! - Writes go to a temp file, are synced, then renamed over the target.
//! - Files are created `0600` and directories `0700` on Unix.
//! - The root is guarded by an exclusive `fs2` lock for the life of the store.

use super::{validate_name, KeyValueStore};
use crate::errors::StorageError;
use fs2::FileExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const LOCK_FILE: &str = "LOCK";
const LOCK_ATTEMPTS: u32 = 5;
const RECORD_EXT: &str = "json";

/// File-backed record store.
pub struct JsonFileStore {
    root: PathBuf,
    /// Held open to keep the directory lock.
    _lock: File,
    /// Serializes writers inside this process.
    write_guard: Mutex<()>,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// Retries the directory lock with exponential backoff before giving up.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        create_private_dir(&root)?;

        let lock_path = root.join(LOCK_FILE);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;

        let mut delay = Duration::from_millis(50);
        let mut attempt = 0;
        loop {
            match lock.try_lock_exclusive() {
                Ok(()) => break,
                Err(_) if attempt + 1 < LOCK_ATTEMPTS => {
                    attempt += 1;
                    debug!(path = %lock_path.display(), attempt, "storage lock busy, retrying");
                    std::thread::sleep(delay);
                    delay *= 2;
                }
                Err(_) => return Err(StorageError::Locked(root.display().to_string())),
            }
        }

        info!(root = %root.display(), "opened JSON file store");
        Ok(Self {
            root,
            _lock: lock,
            write_guard: Mutex::new(()),
        })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, collection: &str, key: &str) -> Result<PathBuf, StorageError> {
        validate_name(collection)?;
        validate_name(key)?;
        Ok(self
            .root
            .join(collection)
            .join(format!("{key}.{RECORD_EXT}")))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.record_path(collection, key)?;
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::Serialization {
                    collection: collection.to_string(),
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), StorageError> {
        let path = self.record_path(collection, key)?;
        let bytes = serde_json::to_vec_pretty(&value).map_err(|e| StorageError::Serialization {
            collection: collection.to_string(),
            key: key.to_string(),
            message: e.to_string(),
        })?;

        let _guard = self.write_guard.lock();
        create_private_dir(&self.root.join(collection))?;

        let tmp = path.with_extension("tmp");
        {
            let mut file = open_private_file(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StorageError> {
        validate_name(collection)?;
        let dir = self.root.join(collection);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();

        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(collection, &key)? {
                records.push((key, value));
            }
        }
        Ok(records)
    }

    fn delete(&self, collection: &str, key: &str) -> Result<bool, StorageError> {
        let path = self.record_path(collection, key)?;
        let _guard = self.write_guard.lock();
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn create_private_dir(path: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

fn open_private_file(path: &Path) -> Result<File, StorageError> {
    let mut options = OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    Ok(options.open(path)?)
}
