//! Point-in-time JSON backups with a SHA-256 checksum.
//!
//! A backup file holds every live entity envelope plus a checksum over the
//! serialized entity list; restore refuses a file whose checksum does not
//! match.

use crate::error::{AppError, Result};
use crate::persistence::StoredEntity;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const BACKUP_PREFIX: &str = "backup-";
const BACKUP_EXTENSION: &str = "json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupFile {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// What triggered the backup, e.g. `delete agent:a1`
    pub reason: String,
    pub checksum: String,
    pub entities: Vec<StoredEntity>,
}

/// Summary of a backup on disk
#[derive(Debug, Clone, PartialEq)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub entity_count: usize,
}

pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn checksum(entities: &[StoredEntity]) -> Result<String> {
        let bytes = serde_json::to_vec(entities)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    /// Write a backup of `entities`
    pub async fn create(&self, entities: Vec<StoredEntity>, reason: &str) -> Result<BackupInfo> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let created_at = Utc::now();
        let backup = BackupFile {
            id: Uuid::new_v4(),
            created_at,
            reason: reason.to_string(),
            checksum: Self::checksum(&entities)?,
            entities,
        };

        let file_name = format!(
            "{}{}-{}.{}",
            BACKUP_PREFIX,
            created_at.format("%Y%m%dT%H%M%S%.3fZ"),
            backup.id.simple(),
            BACKUP_EXTENSION
        );
        let path = self.dir.join(file_name);
        let tmp = path.with_extension("tmp");

        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&backup)?).await?;
        tokio::fs::rename(&tmp, &path).await?;

        info!(
            path = ?path,
            entities = backup.entities.len(),
            reason = %reason,
            "Backup created"
        );

        Ok(BackupInfo {
            path,
            created_at,
            entity_count: backup.entities.len(),
        })
    }

    /// Load and verify a backup file
    pub async fn load(&self, path: &Path) -> Result<BackupFile> {
        let bytes = tokio::fs::read(path).await?;
        let backup: BackupFile = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Corruption(format!("{:?}: {}", path, e)))?;

        let actual = Self::checksum(&backup.entities)?;
        if actual != backup.checksum {
            warn!(path = ?path, "Backup checksum mismatch");
            return Err(AppError::Corruption(format!(
                "{:?}: checksum mismatch (expected {}, got {})",
                path, backup.checksum, actual
            )));
        }

        Ok(backup)
    }

    /// Backups on disk, newest first
    pub async fn list(&self) -> Result<Vec<BackupInfo>> {
        let mut backups = Vec::new();

        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(backups),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if !Self::is_backup_file(&path) {
                continue;
            }
            match self.load(&path).await {
                Ok(backup) => backups.push(BackupInfo {
                    path,
                    created_at: backup.created_at,
                    entity_count: backup.entities.len(),
                }),
                Err(e) => warn!(path = ?path, error = %e, "Skipping unreadable backup"),
            }
        }

        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    pub async fn latest(&self) -> Result<Option<BackupInfo>> {
        Ok(self.list().await?.into_iter().next())
    }

    /// Delete backup files older than `retention`; returns how many went
    pub async fn prune(&self, retention: Duration) -> Result<usize> {
        let cutoff = Utc::now()
            - ChronoDuration::from_std(retention).unwrap_or_else(|_| ChronoDuration::days(7));

        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if !Self::is_backup_file(&path) {
                continue;
            }
            let modified: DateTime<Utc> = entry.metadata().await?.modified()?.into();
            if modified < cutoff {
                tokio::fs::remove_file(&path).await?;
                debug!(path = ?path, "Pruned stale backup");
                removed += 1;
            }
        }

        Ok(removed)
    }

    fn is_backup_file(path: &Path) -> bool {
        let name_ok = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(BACKUP_PREFIX))
            .unwrap_or(false);
        name_ok && path.extension().and_then(|e| e.to_str()) == Some(BACKUP_EXTENSION)
    }
}
