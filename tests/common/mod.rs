//! Shared fakes and fixtures for the integration tests

#![allow(dead_code)]

use agent_resilience::error::{AppError, Result};
use agent_resilience::manager::{ErrorHandlingManager, ErrorHandlingManagerConfig};
use agent_resilience::operations::DependencyProbe;
use agent_resilience::persistence::{PersistenceBackend, StoreConfig};
use agent_resilience::resources::{ResourceProbe, ResourceUsage};
use agent_resilience::retry::RetryConfig;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Manager with millisecond retry delays
pub fn fast_manager() -> Arc<ErrorHandlingManager> {
    let config = ErrorHandlingManagerConfig {
        retry: RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            ..Default::default()
        },
        ..Default::default()
    };
    Arc::new(ErrorHandlingManager::new(config).unwrap())
}

pub fn store_config(root: &Path) -> StoreConfig {
    StoreConfig {
        data_dir: root.join("db"),
        backup_dir: root.join("backups"),
        ..Default::default()
    }
}

pub struct FakeSwarm {
    pub initialized: bool,
    pub idle_agents: usize,
}

#[async_trait]
impl DependencyProbe for FakeSwarm {
    async fn is_initialized(&self) -> bool {
        self.initialized
    }

    async fn idle_agent_count(&self) -> usize {
        self.idle_agents
    }
}

/// Reports a fixed fraction of system memory in use
pub struct FixedMemory(pub f64);

impl ResourceProbe for FixedMemory {
    fn sample(&self) -> ResourceUsage {
        ResourceUsage {
            process_memory_bytes: 1024,
            system_used_memory_bytes: (self.0 * 1_000_000.0) as u64,
            system_total_memory_bytes: 1_000_000,
        }
    }
}

/// Backend that fails every write. `suspect` fails the integrity check too,
/// `scan_fails` fails key listing.
#[derive(Default)]
pub struct FailingBackend {
    pub writes: AtomicU32,
    pub suspect: bool,
    pub scan_fails: bool,
}

#[async_trait]
impl PersistenceBackend for FailingBackend {
    async fn create(&self, _key: &str, _value: Vec<u8>) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Database("disk i/o failure".to_string()))
    }

    async fn read(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn update(&self, _key: &str, _value: Vec<u8>) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Database("disk i/o failure".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }

    async fn keys(&self, _prefix: &str) -> Result<Vec<String>> {
        if self.scan_fails {
            return Err(AppError::Database("index scan failed".to_string()));
        }
        Ok(Vec::new())
    }

    async fn integrity_check(&self) -> Result<()> {
        if self.suspect {
            return Err(AppError::Corruption("database file implausibly small".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "failing"
    }
}
