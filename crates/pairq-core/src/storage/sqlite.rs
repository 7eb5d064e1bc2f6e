use super::BlobStore;
use anyhow::Context;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// A single SQLite file holding any number of named stores.
#[derive(Clone)]
pub struct SqliteDb {
    pub conn: Arc<Mutex<Connection>>,
}

impl SqliteDb {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite db {}", path.display()))?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(super::schema::DDL)?;
        Ok(())
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("sqlite connection poisoned"))
    }

    pub fn store(&self, name: &str) -> SqliteBlobStore {
        SqliteBlobStore {
            db: self.clone(),
            name: name.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct SqliteBlobStore {
    db: SqliteDb,
    name: String,
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare("SELECT value_json FROM blobs WHERE store=?1 AND key=?2")?;
        let mut rows = stmt.query(params![self.name, key])?;
        let raw: Option<String> = match rows.next()? {
            Some(row) => Some(row.get(0)?),
            None => None,
        };
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO blobs(store, key, value_json, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(store, key) DO UPDATE SET value_json=excluded.value_json, updated_at=excluded.updated_at",
            params![
                self.name,
                key,
                serde_json::to_string(value)?,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "DELETE FROM blobs WHERE store=?1 AND key=?2",
            params![self.name, key],
        )?;
        Ok(())
    }

    async fn list(&self) -> anyhow::Result<Vec<String>> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare("SELECT key FROM blobs WHERE store=?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![self.name], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn store_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stores_are_isolated_by_name() -> anyhow::Result<()> {
        let db = SqliteDb::memory()?;
        let a = db.store("a");
        let b = db.store("b");

        a.set("k", &serde_json::json!([1, 2])).await?;
        assert_eq!(a.get("k").await?, Some(serde_json::json!([1, 2])));
        assert!(b.get("k").await?.is_none());
        assert!(b.list().await?.is_empty());

        a.set("k", &serde_json::json!([3])).await?;
        assert_eq!(a.get("k").await?, Some(serde_json::json!([3])));
        Ok(())
    }

    #[tokio::test]
    async fn test_survives_reopen() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("blobs.db");
        {
            let db = SqliteDb::open(&path)?;
            db.store("tasks").set("_index", &serde_json::json!(["x"])).await?;
        }
        let db = SqliteDb::open(&path)?;
        let store = db.store("tasks");
        assert_eq!(store.get("_index").await?, Some(serde_json::json!(["x"])));
        assert_eq!(store.list().await?, vec!["_index".to_string()]);

        store.delete("_index").await?;
        store.delete("_index").await?;
        assert!(store.get("_index").await?.is_none());
        Ok(())
    }
}
