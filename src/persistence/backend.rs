use crate::error::Result;
use async_trait::async_trait;

/// Raw key/value primitives the resilient store is built on.
///
/// Values are opaque bytes; serialization and corruption detection belong to
/// the store.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Insert a new key. Fails with `AppError::Conflict` if it exists.
    async fn create(&self, key: &str, value: Vec<u8>) -> Result<()>;

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace an existing key. Fails with `AppError::NotFound` if absent.
    async fn update(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove a key, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All keys starting with `prefix`
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Verify the backend looks sound; run once at startup
    async fn integrity_check(&self) -> Result<()>;

    /// Backend name for logs
    fn name(&self) -> &str;
}
