use crate::error::{AppError, Result};
use crate::manager::ErrorHandlingManager;
use crate::metrics::RESILIENCE_METRICS;
use crate::models::{ErrorCategory, OperationContext, OperationOutcome};
use crate::recovery::InMemoryPersistenceFallback;
use crate::persistence::{
    entity_key, BackupInfo, BackupManager, Entity, EntityKind, ExpiringCache, MutationKind,
    PersistenceBackend, SledBackend, StoredEntity, TransactionLog,
};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const COMPONENT: &str = "persistence";

/// Store settings
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Directory holding the sled database
    pub data_dir: PathBuf,
    /// Directory holding backups
    pub backup_dir: PathBuf,
    /// Smallest database size the startup integrity check accepts
    pub min_db_size_bytes: u64,
    /// Entry limit of the in-memory fallback
    pub fallback_capacity: u64,
    pub transaction_retention: Duration,
    pub backup_retention: Duration,
    /// Risky operations skip the backup if the last one is more recent
    pub min_backup_interval: Duration,
    pub maintenance_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/db"),
            backup_dir: PathBuf::from("./data/backups"),
            min_db_size_bytes: 1,
            fallback_capacity: 100_000,
            transaction_retention: Duration::from_secs(24 * 3600),
            backup_retention: Duration::from_secs(7 * 24 * 3600),
            min_backup_interval: Duration::from_secs(60),
            maintenance_interval: Duration::from_secs(300),
        }
    }
}

/// Acknowledgement of a mutation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreAck {
    pub key: String,
    /// Transaction log entry, absent in degraded mode
    pub transaction_id: Option<Uuid>,
    /// The mutation only reached the in-memory fallback
    pub degraded: bool,
}

/// What one maintenance sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MaintenanceReport {
    pub expired_purged: u64,
    pub corrupted_removed: usize,
    pub transactions_pruned: usize,
    pub backups_pruned: usize,
}

/// Transactional store over a [`PersistenceBackend`] that falls back to an
/// in-memory expiring map when the backend is unusable.
pub struct ResilientStore {
    backend: Option<Arc<dyn PersistenceBackend>>,
    manager: Arc<ErrorHandlingManager>,
    fallback: ExpiringCache,
    transactions: TransactionLog,
    backups: BackupManager,
    degraded: AtomicBool,
    cleanup_queue: Mutex<HashSet<String>>,
    last_backup: Mutex<Option<Instant>>,
    config: StoreConfig,
    maintenance: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl ResilientStore {
    /// Open the sled backend under `config.data_dir`, degrading to memory if
    /// it cannot be opened or fails its integrity check
    pub async fn open(config: StoreConfig, manager: Arc<ErrorHandlingManager>) -> Arc<Self> {
        match SledBackend::open(&config.data_dir, config.min_db_size_bytes) {
            Ok(backend) => Self::with_backend(Arc::new(backend), config, manager).await,
            Err(e) => {
                error!(error = %e, path = ?config.data_dir, "Failed to open backend");
                Arc::new(Self::build(None, config, manager, Some(e.to_string())))
            }
        }
    }

    /// Use `backend`, running its integrity check first
    pub async fn with_backend(
        backend: Arc<dyn PersistenceBackend>,
        config: StoreConfig,
        manager: Arc<ErrorHandlingManager>,
    ) -> Arc<Self> {
        let failure = match backend.integrity_check().await {
            Ok(()) => None,
            Err(e) => {
                error!(backend = backend.name(), error = %e, "Backend integrity check failed");
                Some(e.to_string())
            }
        };
        Arc::new(Self::build(Some(backend), config, manager, failure))
    }

    /// Store that runs on the in-memory fallback only
    pub fn in_memory(config: StoreConfig, manager: Arc<ErrorHandlingManager>) -> Arc<Self> {
        Arc::new(Self::build(
            None,
            config,
            manager,
            Some("no backend configured".to_string()),
        ))
    }

    fn build(
        backend: Option<Arc<dyn PersistenceBackend>>,
        config: StoreConfig,
        manager: Arc<ErrorHandlingManager>,
        degraded_reason: Option<String>,
    ) -> Self {
        manager.register_fallback(COMPONENT, Arc::new(InMemoryPersistenceFallback));

        let store = Self {
            backend,
            manager,
            fallback: ExpiringCache::new(config.fallback_capacity),
            transactions: TransactionLog::new(),
            backups: BackupManager::new(config.backup_dir.clone()),
            degraded: AtomicBool::new(false),
            cleanup_queue: Mutex::new(HashSet::new()),
            last_backup: Mutex::new(None),
            config,
            maintenance: Mutex::new(None),
        };

        match degraded_reason {
            Some(reason) => store.enter_degraded_mode(&reason),
            None => RESILIENCE_METRICS.store_degraded.set(0.0),
        }
        store
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Switch every further operation to the in-memory fallback
    pub fn enter_degraded_mode(&self, reason: &str) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(reason = %reason, "Persistence degraded to in-memory fallback");
            RESILIENCE_METRICS.store_degraded.set(1.0);
        }
    }

    pub fn transactions(&self) -> &TransactionLog {
        &self.transactions
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    /// Keys waiting for the next maintenance sweep
    pub fn pending_cleanup(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.cleanup_queue.lock().iter().cloned().collect();
        keys.sort();
        keys
    }

    /// Limitations callers should surface while degraded
    pub fn limitations(&self) -> Vec<String> {
        if self.is_degraded() {
            vec![
                "Data will not persist across restarts".to_string(),
                "Storage is limited to the current session".to_string(),
            ]
        } else {
            Vec::new()
        }
    }

    fn active_backend(&self) -> Option<&Arc<dyn PersistenceBackend>> {
        if self.is_degraded() {
            None
        } else {
            self.backend.as_ref()
        }
    }

    fn context(operation: &str) -> OperationContext {
        OperationContext::new(ErrorCategory::Persistence, COMPONENT, operation)
    }

    /// Run one backend mutation under a transaction entry
    async fn transact<F, Fut>(
        &self,
        kind: MutationKind,
        key: &str,
        snapshot: Option<serde_json::Value>,
        operation: F,
    ) -> Result<Option<Uuid>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let tx = self.transactions.begin(kind, key, snapshot);

        match self
            .manager
            .wrap_operation(operation, Self::context(&kind.to_string()))
            .await
        {
            Ok(OperationOutcome::Completed(())) => {
                self.transactions.commit(tx);
                Ok(Some(tx))
            }
            Ok(outcome) => {
                let reason = format!("backend bypassed by recovery: {:?}", outcome.limitations());
                self.transactions.rollback(tx, reason.clone());
                self.enter_degraded_mode(&reason);
                Ok(None)
            }
            Err(e) => {
                self.transactions.rollback(tx, e.to_string());
                Err(e)
            }
        }
    }

    pub async fn create(&self, entity: Entity) -> Result<StoreAck> {
        entity.validate_shape()?;
        let key = entity.key();
        let stored = StoredEntity::from_entity(&entity, Utc::now());
        let bytes = stored.to_bytes()?;

        if let Some(backend) = self.active_backend() {
            let tx = self
                .transact(MutationKind::Create, &key, Some(entity.data.clone()), || {
                    backend.create(&key, bytes.clone())
                })
                .await?;
            if let Some(tx) = tx {
                debug!(key = %key, "Entity created");
                return Ok(StoreAck {
                    key,
                    transaction_id: Some(tx),
                    degraded: false,
                });
            }
        }

        if self.fallback.contains(&key).await {
            return Err(AppError::Conflict(format!("'{}' already exists", key)));
        }
        self.fallback.insert(key.clone(), bytes, entity.ttl).await;
        debug!(key = %key, "Entity created in memory");
        Ok(StoreAck {
            key,
            transaction_id: None,
            degraded: true,
        })
    }

    pub async fn update(&self, entity: Entity) -> Result<StoreAck> {
        entity.validate_shape()?;
        let key = entity.key();
        let now = Utc::now();

        if let Some(backend) = self.active_backend() {
            let tx = self
                .transact(MutationKind::Update, &key, Some(entity.data.clone()), || {
                    let backend = backend.clone();
                    let key = key.clone();
                    let entity = entity.clone();
                    async move {
                        let existing = backend
                            .read(&key)
                            .await?
                            .and_then(|bytes| StoredEntity::from_bytes(&bytes).ok())
                            .filter(|stored| !stored.is_expired(now))
                            .ok_or_else(|| AppError::NotFound(format!("'{}' not found", key)))?;
                        backend
                            .update(&key, existing.updated(&entity, now).to_bytes()?)
                            .await
                    }
                })
                .await?;
            if let Some(tx) = tx {
                debug!(key = %key, "Entity updated");
                return Ok(StoreAck {
                    key,
                    transaction_id: Some(tx),
                    degraded: false,
                });
            }
        }

        let existing = self
            .read_fallback(&key)
            .await
            .ok_or_else(|| AppError::NotFound(format!("'{}' not found", key)))?;
        let bytes = existing.updated(&entity, now).to_bytes()?;
        self.fallback.insert(key.clone(), bytes, entity.ttl).await;
        Ok(StoreAck {
            key,
            transaction_id: None,
            degraded: true,
        })
    }

    /// Delete an entity, taking a backup first. Returns whether it existed.
    pub async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let key = entity_key(kind, id);
        self.backup_before_risky(&format!("delete {}", key)).await;

        if let Some(backend) = self.active_backend() {
            let existed = Arc::new(AtomicBool::new(false));
            let tx = self
                .transact(MutationKind::Delete, &key, None, || {
                    let backend = backend.clone();
                    let key = key.clone();
                    let existed = existed.clone();
                    async move {
                        existed.store(backend.delete(&key).await?, Ordering::SeqCst);
                        Ok::<_, AppError>(())
                    }
                })
                .await?;
            if tx.is_some() {
                self.cleanup_queue.lock().remove(&key);
                return Ok(existed.load(Ordering::SeqCst));
            }
        }

        Ok(self.fallback.remove(&key).await)
    }

    /// Read an entity. Expired and corrupted records read as absent; the
    /// latter are queued for cleanup.
    pub async fn read(&self, kind: EntityKind, id: &str) -> Result<Option<StoredEntity>> {
        let key = entity_key(kind, id);

        if let Some(backend) = self.active_backend() {
            let outcome = self
                .manager
                .wrap_operation(|| backend.read(&key), Self::context("read"))
                .await?;
            match outcome {
                OperationOutcome::Completed(bytes) => {
                    return Ok(bytes.and_then(|bytes| self.decode(&key, &bytes)));
                }
                other => {
                    self.enter_degraded_mode(&format!(
                        "read served by recovery: {:?}",
                        other.limitations()
                    ));
                }
            }
        }

        Ok(self.read_fallback(&key).await)
    }

    async fn read_fallback(&self, key: &str) -> Option<StoredEntity> {
        let entry = self.fallback.get(key).await?;
        self.decode(key, &entry.value)
    }

    fn decode(&self, key: &str, bytes: &[u8]) -> Option<StoredEntity> {
        match StoredEntity::from_bytes(bytes) {
            Ok(stored) if entity_key(stored.kind, &stored.id) != key => {
                warn!(key = %key, stored_key = %entity_key(stored.kind, &stored.id), "Stored record does not match its key, scheduling cleanup");
                self.cleanup_queue.lock().insert(key.to_string());
                None
            }
            Ok(stored) if stored.is_expired(Utc::now()) => {
                debug!(key = %key, "Record expired");
                self.cleanup_queue.lock().insert(key.to_string());
                None
            }
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!(key = %key, error = %e, "Corrupted record detected, scheduling cleanup");
                self.cleanup_queue.lock().insert(key.to_string());
                None
            }
        }
    }

    /// Live entities of `kind`
    pub async fn list(&self, kind: EntityKind) -> Result<Vec<StoredEntity>> {
        let prefix = format!("{}:", kind);
        let mut entities = Vec::new();

        if let Some(backend) = self.active_backend() {
            let outcome = self
                .manager
                .wrap_operation(
                    || {
                        let backend = backend.clone();
                        let prefix = prefix.clone();
                        async move {
                            let mut records = Vec::new();
                            for key in backend.keys(&prefix).await? {
                                if let Some(bytes) = backend.read(&key).await? {
                                    records.push((key, bytes));
                                }
                            }
                            Ok::<_, AppError>(records)
                        }
                    },
                    Self::context("list"),
                )
                .await?;
            match outcome {
                OperationOutcome::Completed(records) => {
                    for (key, bytes) in records {
                        entities.extend(self.decode(&key, &bytes));
                    }
                    entities.sort_by(|a, b| a.id.cmp(&b.id));
                    return Ok(entities);
                }
                other => {
                    self.enter_degraded_mode(&format!(
                        "list served by recovery: {:?}",
                        other.limitations()
                    ));
                }
            }
        }

        for key in self.fallback.keys(&prefix) {
            entities.extend(self.read_fallback(&key).await);
        }

        entities.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entities)
    }

    async fn all_entities(&self) -> Result<Vec<StoredEntity>> {
        let mut all = Vec::new();
        for kind in EntityKind::iter() {
            all.extend(self.list(kind).await?);
        }
        Ok(all)
    }

    /// Back up every live entity now
    pub async fn backup_now(&self, reason: &str) -> Result<BackupInfo> {
        let entities = self.all_entities().await?;
        let info = self.backups.create(entities, reason).await?;
        *self.last_backup.lock() = Some(Instant::now());
        Ok(info)
    }

    /// Backup ahead of a risky operation. Skipped when the previous backup is
    /// younger than `min_backup_interval`; failures are logged, not returned.
    async fn backup_before_risky(&self, reason: &str) {
        let last = *self.last_backup.lock();
        let recent = last
            .map(|at| at.elapsed() < self.config.min_backup_interval)
            .unwrap_or(false);
        if recent {
            debug!(reason = %reason, "Skipping backup, last one is recent");
            return;
        }

        if let Err(e) = self.backup_now(reason).await {
            warn!(reason = %reason, error = %e, "Backup before risky operation failed");
        }
    }

    /// Remove every entity, taking a backup first
    pub async fn clear(&self) -> Result<usize> {
        self.backup_before_risky("clear").await;
        let entities = self.all_entities().await?;
        let count = entities.len();

        if let Some(backend) = self.active_backend() {
            let tx = self
                .transact(MutationKind::Clear, "*", None, || {
                    let backend = backend.clone();
                    async move {
                        for key in backend.keys("").await? {
                            backend.delete(&key).await?;
                        }
                        Ok::<_, AppError>(())
                    }
                })
                .await?;
            if tx.is_some() {
                info!(count, "Store cleared");
                return Ok(count);
            }
        }

        self.fallback.clear().await;
        info!(count, "In-memory store cleared");
        Ok(count)
    }

    /// Replace the contents with a verified backup
    pub async fn restore(&self, path: &Path) -> Result<usize> {
        let backup = self.backups.load(path).await?;
        self.backup_before_risky(&format!("restore {:?}", path)).await;

        let now = Utc::now();
        let live: Vec<StoredEntity> = backup
            .entities
            .into_iter()
            .filter(|e| !e.is_expired(now))
            .collect();
        let count = live.len();

        if let Some(backend) = self.active_backend() {
            let records = live.clone();
            let tx = self
                .transact(
                    MutationKind::Restore,
                    "*",
                    Some(serde_json::json!({ "backup": path, "entities": count })),
                    || {
                        let backend = backend.clone();
                        let records = records.clone();
                        async move {
                            for key in backend.keys("").await? {
                                backend.delete(&key).await?;
                            }
                            for record in &records {
                                backend
                                    .create(&entity_key(record.kind, &record.id), record.to_bytes()?)
                                    .await?;
                            }
                            Ok::<_, AppError>(())
                        }
                    },
                )
                .await?;
            if tx.is_some() {
                info!(path = ?path, count, "Store restored from backup");
                return Ok(count);
            }
        }

        self.fallback.clear().await;
        for record in live {
            let ttl = record
                .expires_at
                .and_then(|at| (at - now).to_std().ok());
            self.fallback
                .insert(entity_key(record.kind, &record.id), record.to_bytes()?, ttl)
                .await;
        }
        info!(path = ?path, count, "In-memory store restored from backup");
        Ok(count)
    }

    /// Restore the newest backup
    pub async fn restore_latest(&self) -> Result<usize> {
        let latest = self
            .backups
            .latest()
            .await?
            .ok_or_else(|| AppError::NotFound("no backups available".to_string()))?;
        self.restore(&latest.path).await
    }

    /// Purge expired and corrupted records, old transactions and stale backups
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport {
            expired_purged: self.fallback.purge_expired().await,
            ..Default::default()
        };

        if let Some(backend) = self.active_backend() {
            match self.sweep_backend(backend.as_ref()).await {
                Ok((expired, corrupted)) => {
                    report.expired_purged += expired;
                    report.corrupted_removed = corrupted;
                }
                Err(e) => warn!(error = %e, "Backend sweep failed"),
            }
        } else {
            report.corrupted_removed = self.sweep_fallback().await;
        }

        report.transactions_pruned = self.transactions.prune(self.config.transaction_retention);

        match self.backups.prune(self.config.backup_retention).await {
            Ok(pruned) => report.backups_pruned = pruned,
            Err(e) => warn!(error = %e, "Backup pruning failed"),
        }

        info!(
            expired = report.expired_purged,
            corrupted = report.corrupted_removed,
            transactions = report.transactions_pruned,
            backups = report.backups_pruned,
            "Maintenance sweep completed"
        );
        report
    }

    async fn sweep_backend(&self, backend: &dyn PersistenceBackend) -> Result<(u64, usize)> {
        let now = Utc::now();
        let mut expired = 0;
        let mut corrupted = 0;

        for key in backend.keys("").await? {
            let Some(bytes) = backend.read(&key).await? else {
                continue;
            };
            match StoredEntity::from_bytes(&bytes) {
                Ok(stored) if entity_key(stored.kind, &stored.id) == key => {
                    if stored.is_expired(now) && backend.delete(&key).await? {
                        expired += 1;
                    }
                }
                _ => {
                    if backend.delete(&key).await? {
                        warn!(key = %key, "Removed corrupted record");
                        corrupted += 1;
                    }
                }
            }
        }

        self.cleanup_queue.lock().clear();
        Ok((expired, corrupted))
    }

    /// Drop queued in-memory entries that still fail to decode, are expired
    /// or sit under the wrong key
    async fn sweep_fallback(&self) -> usize {
        let queued: Vec<String> = self.cleanup_queue.lock().drain().collect();
        let now = Utc::now();
        let mut removed = 0;

        for key in queued {
            let Some(entry) = self.fallback.get(&key).await else {
                continue;
            };
            let valid = StoredEntity::from_bytes(&entry.value)
                .map(|stored| entity_key(stored.kind, &stored.id) == key && !stored.is_expired(now))
                .unwrap_or(false);
            if !valid && self.fallback.remove(&key).await {
                warn!(key = %key, "Removed corrupted in-memory record");
                removed += 1;
            }
        }
        removed
    }

    /// Start the periodic maintenance loop; a no-op when already running
    pub fn start_maintenance(self: &Arc<Self>) {
        let mut task = self.maintenance.lock();
        if task.is_some() {
            return;
        }

        let token = CancellationToken::new();
        let child = token.clone();
        let store = Arc::downgrade(self);
        let period = self.config.maintenance_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately; the first sweep waits one period
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        match store.upgrade() {
                            Some(store) => {
                                store.run_maintenance().await;
                            }
                            None => break,
                        }
                    }
                }
            }
            debug!("Maintenance loop stopped");
        });

        info!(interval_secs = period.as_secs(), "Started store maintenance");
        *task = Some((token, handle));
    }

    pub async fn stop_maintenance(&self) {
        let task = self.maintenance.lock().take();
        if let Some((token, handle)) = task {
            token.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "Maintenance task ended abnormally");
            }
            info!("Stopped store maintenance");
        }
    }
}

impl Drop for ResilientStore {
    fn drop(&mut self) {
        if let Some((token, _)) = self.maintenance.get_mut().take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ErrorHandlingManagerConfig;
    use crate::persistence::TransactionStatus;
    use serde_json::json;
    use tempfile::TempDir;

    fn manager() -> Arc<ErrorHandlingManager> {
        Arc::new(ErrorHandlingManager::new(ErrorHandlingManagerConfig::default()).unwrap())
    }

    fn config(dir: &TempDir) -> StoreConfig {
        StoreConfig {
            data_dir: dir.path().join("db"),
            backup_dir: dir.path().join("backups"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_crud_commits_transactions() {
        let dir = TempDir::new().unwrap();
        let store = ResilientStore::open(config(&dir), manager()).await;
        assert!(!store.is_degraded());

        let ack = store
            .create(Entity::new(EntityKind::Agent, "a1", json!({"type": "coder"})))
            .await
            .unwrap();
        assert!(!ack.degraded);
        assert!(ack.transaction_id.is_some());

        store
            .update(Entity::new(EntityKind::Agent, "a1", json!({"type": "tester"})))
            .await
            .unwrap();
        let read = store.read(EntityKind::Agent, "a1").await.unwrap().unwrap();
        assert_eq!(read.data["type"], "tester");

        assert!(store.delete(EntityKind::Agent, "a1").await.unwrap());
        assert!(store.read(EntityKind::Agent, "a1").await.unwrap().is_none());
        assert_eq!(
            store.transactions().with_status(TransactionStatus::Committed).len(),
            3
        );
    }

    #[tokio::test]
    async fn test_invalid_entity_never_reaches_storage() {
        let dir = TempDir::new().unwrap();
        let store = ResilientStore::open(config(&dir), manager()).await;

        let err = store
            .create(Entity::new(EntityKind::Task, "", json!({})))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_create_and_missing_update() {
        let dir = TempDir::new().unwrap();
        let store = ResilientStore::open(config(&dir), manager()).await;
        let entity = Entity::new(EntityKind::Swarm, "s1", json!({"topology": "mesh"}));

        store.create(entity.clone()).await.unwrap();
        assert!(matches!(
            store.create(entity).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            store
                .update(Entity::new(EntityKind::Swarm, "s2", json!({})))
                .await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(
            store.transactions().with_status(TransactionStatus::RolledBack).len(),
            2
        );
    }

    #[tokio::test]
    async fn test_delete_takes_rate_limited_backup() {
        let dir = TempDir::new().unwrap();
        let store = ResilientStore::open(config(&dir), manager()).await;
        store
            .create(Entity::new(EntityKind::Task, "t1", json!({})))
            .await
            .unwrap();
        store
            .create(Entity::new(EntityKind::Task, "t2", json!({})))
            .await
            .unwrap();

        store.delete(EntityKind::Task, "t1").await.unwrap();
        store.delete(EntityKind::Task, "t2").await.unwrap();

        let backups = store.backups().list().await.unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].entity_count, 2);

        assert_eq!(store.restore(&backups[0].path).await.unwrap(), 2);
        assert_eq!(store.list(EntityKind::Task).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let dir = TempDir::new().unwrap();
        let store = ResilientStore::in_memory(config(&dir), manager());
        assert!(store.is_degraded());
        assert!(!store.limitations().is_empty());

        let ack = store
            .create(Entity::new(EntityKind::Memory, "m1", json!({"v": 1})))
            .await
            .unwrap();
        assert!(ack.degraded);
        assert!(ack.transaction_id.is_none());

        store
            .update(Entity::new(EntityKind::Memory, "m1", json!({"v": 2})))
            .await
            .unwrap();
        assert_eq!(
            store.read(EntityKind::Memory, "m1").await.unwrap().unwrap().data["v"],
            2
        );
        assert_eq!(store.clear().await.unwrap(), 1);
        assert!(store.list(EntityKind::Memory).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_maintenance_removes_corrupted_in_memory_records() {
        let dir = TempDir::new().unwrap();
        let store = ResilientStore::in_memory(config(&dir), manager());
        store
            .create(Entity::new(EntityKind::Agent, "a2", json!({"type": "coder"})))
            .await
            .unwrap();

        let key = entity_key(EntityKind::Agent, "a1");
        store
            .fallback
            .insert(key.clone(), b"not a record".to_vec(), None)
            .await;

        assert!(store.read(EntityKind::Agent, "a1").await.unwrap().is_none());
        assert_eq!(store.pending_cleanup(), vec![key.clone()]);

        let report = store.run_maintenance().await;

        assert_eq!(report.corrupted_removed, 1);
        assert!(store.pending_cleanup().is_empty());
        assert!(!store.fallback.contains(&key).await);
        assert!(store.read(EntityKind::Agent, "a2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_store_registers_persistence_fallback() {
        let dir = TempDir::new().unwrap();
        let manager = manager();
        let _store = ResilientStore::in_memory(config(&dir), manager.clone());

        manager.register_strategy_override(COMPONENT, crate::recovery::RecoveryStrategy::Fallback);
        let outcome: OperationOutcome<()> = manager
            .wrap_operation(
                || async { Err(AppError::Database("disk i/o failure".to_string())) },
                ResilientStore::context("read"),
            )
            .await
            .unwrap();

        assert!(outcome.is_fallback());
        assert!(outcome
            .limitations()
            .iter()
            .any(|l| l.contains("persist across restarts")));
    }
}
