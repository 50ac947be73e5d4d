mod common;

use agent_resilience::error::AppError;
use agent_resilience::persistence::{
    Entity, EntityKind, PersistenceBackend, ResilientStore, SledBackend, TransactionStatus,
};
use agent_resilience::recovery::RecoveryStrategy;
use common::FailingBackend;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_failed_write_rolls_back() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FailingBackend::default());
    let store = ResilientStore::with_backend(
        backend.clone(),
        common::store_config(dir.path()),
        common::fast_manager(),
    )
    .await;
    assert!(!store.is_degraded());

    let err = store
        .create(Entity::new(EntityKind::Agent, "a1", json!({"type": "coder"})))
        .await
        .unwrap_err();

    assert!(matches!(err.root(), AppError::Database(_)));
    assert!(backend.writes.load(Ordering::SeqCst) >= 1);

    let rolled_back = store.transactions().with_status(TransactionStatus::RolledBack);
    assert_eq!(rolled_back.len(), 1);
    assert_eq!(rolled_back[0].key, "agent:a1");
    assert_eq!(rolled_back[0].snapshot, Some(json!({"type": "coder"})));
    assert!(store
        .transactions()
        .with_status(TransactionStatus::Committed)
        .is_empty());
}

#[tokio::test]
async fn test_corrupted_record_reads_as_absent_and_is_swept() {
    let dir = TempDir::new().unwrap();
    let config = common::store_config(dir.path());
    let backend = Arc::new(SledBackend::open(&config.data_dir, 1).unwrap());
    let store =
        ResilientStore::with_backend(backend.clone(), config, common::fast_manager()).await;

    store
        .create(Entity::new(EntityKind::Task, "t1", json!({"status": "queued"})))
        .await
        .unwrap();
    backend.create("task:t2", b"{not json".to_vec()).await.unwrap();

    assert!(store.read(EntityKind::Task, "t2").await.unwrap().is_none());
    assert_eq!(store.pending_cleanup(), vec!["task:t2".to_string()]);
    assert_eq!(store.list(EntityKind::Task).await.unwrap().len(), 1);

    let report = store.run_maintenance().await;
    assert_eq!(report.corrupted_removed, 1);
    assert!(backend.read("task:t2").await.unwrap().is_none());
    assert!(backend.read("task:t1").await.unwrap().is_some());
    assert!(store.pending_cleanup().is_empty());
}

#[tokio::test]
async fn test_unavailable_backend_degrades_and_honors_ttl() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let mut config = common::store_config(dir.path());
    config.data_dir = blocker.join("db");
    let store = ResilientStore::open(config, common::fast_manager()).await;
    assert!(store.is_degraded());

    let ack = store
        .create(
            Entity::new(EntityKind::Memory, "session", json!({"k": "v"}))
                .with_ttl(Duration::from_secs(1)),
        )
        .await
        .unwrap();
    assert!(ack.degraded);
    assert!(store.read(EntityKind::Memory, "session").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(store.read(EntityKind::Memory, "session").await.unwrap().is_none());
}

#[tokio::test]
async fn test_backup_restore_round_trip() {
    let dir = TempDir::new().unwrap();
    let store =
        ResilientStore::open(common::store_config(dir.path()), common::fast_manager()).await;

    for id in ["s1", "s2"] {
        store
            .create(Entity::new(EntityKind::Swarm, id, json!({"topology": "mesh"})))
            .await
            .unwrap();
    }
    let backup = store.backup_now("manual").await.unwrap();
    assert_eq!(backup.entity_count, 2);

    // Backup taken above is recent, so clear skips its own
    assert_eq!(store.clear().await.unwrap(), 2);
    assert!(store.list(EntityKind::Swarm).await.unwrap().is_empty());

    assert_eq!(store.restore_latest().await.unwrap(), 2);
    let restored = store.read(EntityKind::Swarm, "s2").await.unwrap().unwrap();
    assert_eq!(restored.data["topology"], "mesh");
    assert_eq!(store.backups().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_tampered_backup_is_refused() {
    let dir = TempDir::new().unwrap();
    let store =
        ResilientStore::open(common::store_config(dir.path()), common::fast_manager()).await;
    store
        .create(Entity::new(EntityKind::Agent, "a1", json!({"type": "coder"})))
        .await
        .unwrap();
    let backup = store.backup_now("manual").await.unwrap();

    let mut contents: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&backup.path).unwrap()).unwrap();
    contents["entities"][0]["data"]["type"] = json!("intruder");
    std::fs::write(&backup.path, serde_json::to_vec(&contents).unwrap()).unwrap();

    assert!(matches!(
        store.restore(&backup.path).await,
        Err(AppError::Corruption(_))
    ));
    let current = store.read(EntityKind::Agent, "a1").await.unwrap().unwrap();
    assert_eq!(current.data["type"], "coder");
}

#[tokio::test]
async fn test_suspect_backend_runs_in_memory() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FailingBackend {
        suspect: true,
        ..Default::default()
    });
    let store = ResilientStore::with_backend(
        backend.clone(),
        common::store_config(dir.path()),
        common::fast_manager(),
    )
    .await;
    assert!(store.is_degraded());

    let ack = store
        .create(Entity::new(EntityKind::Agent, "a1", json!({"type": "coder"})))
        .await
        .unwrap();
    assert!(ack.degraded);
    assert!(ack.transaction_id.is_none());

    store
        .update(Entity::new(EntityKind::Agent, "a1", json!({"type": "tester"})))
        .await
        .unwrap();
    let read = store.read(EntityKind::Agent, "a1").await.unwrap().unwrap();
    assert_eq!(read.data["type"], "tester");
    assert!(store.delete(EntityKind::Agent, "a1").await.unwrap());

    assert_eq!(backend.writes.load(Ordering::SeqCst), 0);
    assert!(store.transactions().is_empty());
}

#[tokio::test]
async fn test_failing_scan_goes_through_the_manager() {
    let dir = TempDir::new().unwrap();
    let manager = common::fast_manager();
    let backend = Arc::new(FailingBackend {
        scan_fails: true,
        ..Default::default()
    });
    let store = ResilientStore::with_backend(
        backend,
        common::store_config(dir.path()),
        manager.clone(),
    )
    .await;

    let err = store.list(EntityKind::Task).await.unwrap_err();
    assert!(matches!(err.root(), AppError::Database(_)));

    let records = manager.error_log().recent(10);
    assert!(!records.is_empty());
    assert!(records
        .iter()
        .all(|r| r.component == "persistence" && r.operation == "list"));

    assert!(store.backup_now("manual").await.is_err());
}

#[tokio::test]
async fn test_runtime_fallback_switches_store_to_memory() {
    let dir = TempDir::new().unwrap();
    let manager = common::fast_manager();
    manager.register_strategy_override("persistence", RecoveryStrategy::Fallback);
    let store = ResilientStore::with_backend(
        Arc::new(FailingBackend::default()),
        common::store_config(dir.path()),
        manager,
    )
    .await;
    assert!(!store.is_degraded());

    let ack = store
        .create(Entity::new(EntityKind::Swarm, "s1", json!({"topology": "mesh"})))
        .await
        .unwrap();

    assert!(ack.degraded);
    assert!(ack.transaction_id.is_none());
    assert!(store.is_degraded());
    assert_eq!(
        store.transactions().with_status(TransactionStatus::RolledBack).len(),
        1
    );

    let read = store.read(EntityKind::Swarm, "s1").await.unwrap().unwrap();
    assert_eq!(read.data["topology"], "mesh");
}
