use super::BlobStore;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

type Shelf = BTreeMap<String, serde_json::Value>;

/// Process-local store. Clones share the same contents.
#[derive(Clone)]
pub struct MemoryBlobStore {
    name: String,
    data: Arc<Mutex<Shelf>>,
}

impl MemoryBlobStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    fn shelf(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Shelf>> {
        self.data
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store {} poisoned", self.name))
    }

    pub fn len(&self) -> usize {
        self.shelf().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(self.shelf()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        self.shelf()?.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.shelf()?.remove(key);
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.shelf()?.keys().cloned().collect())
    }

    fn store_name(&self) -> &str {
        &self.name
    }
}

/// Hands out the same [`MemoryBlobStore`] for the same store name.
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    stores: Arc<Mutex<HashMap<String, MemoryBlobStore>>>,
}

impl MemoryRegistry {
    pub fn open(&self, name: &str) -> anyhow::Result<MemoryBlobStore> {
        let mut stores = self
            .stores
            .lock()
            .map_err(|_| anyhow::anyhow!("memory registry poisoned"))?;
        Ok(stores
            .entry(name.to_string())
            .or_insert_with(|| MemoryBlobStore::new(name))
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip() -> anyhow::Result<()> {
        let store = MemoryBlobStore::new("t");
        assert!(store.get("k").await?.is_none());

        store.set("k", &serde_json::json!({"a": 1})).await?;
        assert_eq!(store.get("k").await?, Some(serde_json::json!({"a": 1})));
        assert_eq!(store.list().await?, vec!["k".to_string()]);

        store.delete("k").await?;
        store.delete("k").await?;
        assert!(store.is_empty());
        Ok(())
    }

    #[test]
    fn test_registry_shares_by_name() -> anyhow::Result<()> {
        let reg = MemoryRegistry::default();
        let a = reg.open("x")?;
        let b = reg.open("x")?;
        let c = reg.open("y")?;
        a.shelf()?.insert("k".into(), serde_json::Value::Null);
        assert_eq!(b.len(), 1);
        assert_eq!(c.len(), 0);
        Ok(())
    }
}
