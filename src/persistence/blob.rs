//! Single-blob snapshot storage
//!
//! The whole database is serialized as one JSON document,
//! `{"data": {table: [records]}, "schemas": {table: schema}}`, and kept
//! under one key of a [`BlobStore`].

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::persistence::SnapshotAdapter;
use crate::schema::Schema;
use crate::types::Record;

/// String blobs addressed by key
pub trait BlobStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing an absent key is not an error
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Process-local blob store
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.blobs.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.blobs.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.blobs.remove(key);
        Ok(())
    }
}

/// Blob store keeping each key in `<dir>/<key>.json`
///
/// Writes go to a sibling `.tmp` file that is synced and then renamed over
/// the target, so readers never observe a partial blob.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    /// Use `dir`, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str, suffix: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}{}", key, suffix)))
    }
}

/// Check that `key` names a file directly inside the store directory
///
/// Empty keys, `.`, `..` and keys containing a path separator or NUL are
/// rejected.
pub fn validate_key(key: &str) -> Result<()> {
    let escapes = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0']);
    if escapes {
        return Err(StoreError::persistence(format!(
            "Invalid storage key '{}': must be a plain file name",
            key
        )));
    }
    Ok(())
}

impl BlobStore for FileBlobStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path(key, ".json")?) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let target = self.path(key, ".json")?;
        let temp = self.path(key, ".json.tmp")?;

        let mut file = File::create(&temp)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp, &target)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match fs::remove_file(self.path(key, ".json")?) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    data: HashMap<String, Vec<Record>>,
    #[serde(default)]
    schemas: HashMap<String, Schema>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    data: &'a HashMap<String, Vec<Record>>,
    schemas: &'a HashMap<String, Schema>,
}

/// [`SnapshotAdapter`] storing the database under one key of a [`BlobStore`]
#[derive(Debug, Clone)]
pub struct BlobSnapshot<B: BlobStore> {
    blobs: B,
    key: String,
}

impl<B: BlobStore> BlobSnapshot<B> {
    pub fn new(blobs: B, key: impl Into<String>) -> Self {
        Self {
            blobs,
            key: key.into(),
        }
    }

    /// Use the storage key from `config`
    pub fn from_config(blobs: B, config: &StoreConfig) -> Self {
        Self::new(blobs, config.storage_key.clone())
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// Read the stored snapshot; an unreadable payload yields an empty one
    fn read(&self) -> Result<Snapshot> {
        let Some(payload) = self.blobs.get(&self.key)? else {
            return Ok(Snapshot::default());
        };
        match serde_json::from_str(&payload) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!(key = %self.key, error = %e, "stored snapshot is corrupt, starting empty");
                Ok(Snapshot::default())
            }
        }
    }
}

impl<B: BlobStore> SnapshotAdapter for BlobSnapshot<B> {
    fn load_all(&self) -> Result<HashMap<String, Vec<Record>>> {
        Ok(self.read()?.data)
    }

    fn load_schemas(&self) -> Result<HashMap<String, Schema>> {
        Ok(self.read()?.schemas)
    }

    fn save_all(
        &mut self,
        tables: &HashMap<String, Vec<Record>>,
        schemas: &HashMap<String, Schema>,
    ) -> Result<()> {
        let payload = serde_json::to_string(&SnapshotRef {
            data: tables,
            schemas,
        })?;
        self.blobs.set(&self.key, &payload)?;
        debug!(key = %self.key, bytes = payload.len(), "saved snapshot");
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.blobs.remove(&self.key)
    }
}
