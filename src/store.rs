use crate::error::StorageError;
use async_trait::async_trait;

/// Key/value storage collaborator for persisted permission snapshots.
///
/// Backends may be genuinely asynchronous or complete immediately; both are
/// consumed through this one interface. Implementations must be safe for
/// concurrent read/write from a single cache instance.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Reads the value stored under a key, if any.
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, StorageError>;

    /// Writes a value under a key.
    async fn set(&self, key: &str, value: &str) -> std::result::Result<(), StorageError>;
}

/// No-op storage implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStorage;

#[async_trait]
impl Storage for NoStorage {
    async fn get(&self, _key: &str) -> std::result::Result<Option<String>, StorageError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> std::result::Result<(), StorageError> {
        Ok(())
    }
}
