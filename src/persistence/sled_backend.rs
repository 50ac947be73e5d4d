use crate::error::{AppError, Result};
use crate::persistence::PersistenceBackend;
use async_trait::async_trait;
use sled::Db;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const ENTITIES_TREE: &str = "entities";
const META_TREE: &str = "meta";
const PROBE_KEY: &[u8] = b"__integrity_probe__";

/// Persistent backend using the Sled embedded database
#[derive(Clone)]
pub struct SledBackend {
    db: Db,
    entities: sled::Tree,
    meta: sled::Tree,
    path: PathBuf,
    min_size_bytes: u64,
}

impl SledBackend {
    /// Open (or create) a database at `path`.
    ///
    /// `min_size_bytes` is the smallest on-disk size the integrity check
    /// accepts after a flush.
    pub fn open<P: AsRef<Path>>(path: P, min_size_bytes: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path).map_err(|e| {
            AppError::Database(format!("Failed to open Sled database at {:?}: {}", path, e))
        })?;

        let entities = db.open_tree(ENTITIES_TREE)?;
        let meta = db.open_tree(META_TREE)?;

        info!(path = ?path, "Initialized Sled backend");

        Ok(Self {
            db,
            entities,
            meta,
            path,
            min_size_bytes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }

    pub fn size_on_disk(&self) -> Result<u64> {
        Ok(self.db.size_on_disk()?)
    }

    fn key_to_string(key: &[u8]) -> String {
        String::from_utf8_lossy(key).into_owned()
    }
}

#[async_trait]
impl PersistenceBackend for SledBackend {
    async fn create(&self, key: &str, value: Vec<u8>) -> Result<()> {
        match self
            .entities
            .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(value))?
        {
            Ok(()) => {
                debug!(key = %key, "Created key");
                Ok(())
            }
            Err(_) => Err(AppError::Conflict(format!("'{}' already exists", key))),
        }
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entities.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    async fn update(&self, key: &str, value: Vec<u8>) -> Result<()> {
        if !self.entities.contains_key(key.as_bytes())? {
            return Err(AppError::NotFound(format!("'{}' not found", key)));
        }
        self.entities.insert(key.as_bytes(), value)?;
        debug!(key = %key, "Updated key");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.entities.remove(key.as_bytes())?.is_some())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.entities
            .scan_prefix(prefix.as_bytes())
            .keys()
            .map(|key| key.map(|k| Self::key_to_string(&k)).map_err(AppError::from))
            .collect()
    }

    async fn integrity_check(&self) -> Result<()> {
        let stamp = chrono::Utc::now().timestamp_millis().to_be_bytes();
        self.meta.insert(PROBE_KEY, &stamp[..])?;

        match self.meta.get(PROBE_KEY)? {
            Some(read_back) if read_back.as_ref() == &stamp[..] => {}
            _ => {
                return Err(AppError::Corruption(format!(
                    "{:?}: integrity probe did not read back",
                    self.path
                )))
            }
        }

        self.db.flush_async().await?;
        let size = self.db.size_on_disk()?;
        if size < self.min_size_bytes {
            warn!(path = ?self.path, size, min = self.min_size_bytes, "Database file implausibly small");
            return Err(AppError::Corruption(format!(
                "{:?}: database is {} bytes, expected at least {}",
                self.path, size, self.min_size_bytes
            )));
        }

        debug!(path = ?self.path, size, "Integrity check passed");
        Ok(())
    }

    fn name(&self) -> &str {
        "sled"
    }
}
