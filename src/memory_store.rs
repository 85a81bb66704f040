use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::store::Storage;

/// In-memory storage implementation for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a value, bypassing the async interface.
    pub fn seed(&self, key: impl Into<String>, value: impl Into<String>) {
        let mut guard = self.inner.write().expect("poisoned lock");
        guard.insert(key.into(), value.into());
    }

    /// Reads a value synchronously, bypassing the async interface.
    pub fn snapshot(&self, key: &str) -> Option<String> {
        let guard = self.inner.read().expect("poisoned lock");
        guard.get(key).cloned()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, crate::StorageError> {
        let guard = self.inner.read().expect("poisoned lock");
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> std::result::Result<(), crate::StorageError> {
        let mut guard = self.inner.write().expect("poisoned lock");
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn set_then_get_round_trips() {
        let storage = MemoryStorage::new();

        block_on(storage.set("auth", r#"{"read":["data"]}"#)).unwrap();
        let value = block_on(storage.get("auth")).unwrap();

        assert_eq!(value.as_deref(), Some(r#"{"read":["data"]}"#));
        assert_eq!(block_on(storage.get("other")).unwrap(), None);
    }

    #[test]
    fn seed_is_visible_through_the_trait() {
        let storage = MemoryStorage::new();
        storage.seed("auth", "{}");

        assert_eq!(block_on(storage.get("auth")).unwrap().as_deref(), Some("{}"));
        assert_eq!(storage.snapshot("auth").as_deref(), Some("{}"));
    }
}
