use std::{collections::HashMap, sync::Mutex};

use anyhow::Result;
use async_trait::async_trait;

use super::Database;

/// Persistent key-value namespace shared by the user id and the per-site
/// survey answers. Writes are plain overwrites.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[async_trait]
impl KeyValueStore for Database {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_value(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, value).await
    }
}

/// In-process store for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_overwrites() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.set("a", "1").await.unwrap();
        store.set("a", "2").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.get("b").await.unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn database_implements_the_store_trait() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("kv.sqlite3")).unwrap();
        let store: &dyn KeyValueStore = &db;

        store.set("site", "4").await.unwrap();
        assert_eq!(store.get("site").await.unwrap().as_deref(), Some("4"));
    }
}
