//! Ordered task-id lists stored under reserved keys of the task store.
//!
//! Updates are read-modify-write against the store and are not atomic on
//! their own. Callers that mutate an index take [`IndexManager::write_lock`]
//! first; the lock is process-wide per store scope, so two processes writing
//! the same scope can still lose updates.

use crate::storage::{get_json, set_json, BlobStore};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::OwnedMutexGuard;

pub const GLOBAL_INDEX_KEY: &str = "_index";
pub const CONFIG_INDEX_PREFIX: &str = "_index_config_";
/// Marks a per-config index whose append has not completed yet.
pub const PENDING_PREFIX: &str = "_index_pending_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexScope<'a> {
    Global,
    Config(&'a str),
}

impl IndexScope<'_> {
    pub fn key(&self) -> String {
        match self {
            IndexScope::Global => GLOBAL_INDEX_KEY.to_string(),
            IndexScope::Config(id) => format!("{}{}", CONFIG_INDEX_PREFIX, id),
        }
    }
}

pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with(GLOBAL_INDEX_KEY)
}

/// Config id encoded in a per-config index key, if `key` is one.
pub fn config_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(CONFIG_INDEX_PREFIX)
}

fn pending_key(config_id: &str) -> String {
    format!("{}{}", PENDING_PREFIX, config_id)
}

type LockMap = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

fn writer_locks() -> &'static LockMap {
    static LOCKS: OnceLock<LockMap> = OnceLock::new();
    LOCKS.get_or_init(|| Mutex::new(HashMap::new()))
}

#[derive(Clone)]
pub struct IndexManager {
    store: Arc<dyn BlobStore>,
    lock_key: String,
}

impl IndexManager {
    pub fn new(store: Arc<dyn BlobStore>, lock_key: impl Into<String>) -> Self {
        Self {
            store,
            lock_key: lock_key.into(),
        }
    }

    /// Serializes index writers on this store scope within the process.
    pub async fn write_lock(&self) -> anyhow::Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut map = writer_locks()
                .lock()
                .map_err(|_| anyhow::anyhow!("index lock registry poisoned"))?;
            map.entry(self.lock_key.clone()).or_default().clone()
        };
        Ok(lock.lock_owned().await)
    }

    /// The stored list, or empty if the key was never written.
    pub async fn get(&self, scope: IndexScope<'_>) -> anyhow::Result<Vec<String>> {
        Ok(get_json::<Vec<String>>(self.store.as_ref(), &scope.key())
            .await?
            .unwrap_or_default())
    }

    /// Appends the ids not yet present, keeping order. Returns the new length.
    pub async fn append_unique(
        &self,
        scope: IndexScope<'_>,
        new_ids: &[String],
    ) -> anyhow::Result<usize> {
        let mut ids = self.get(scope).await?;
        let mut seen: HashSet<String> = ids.iter().cloned().collect();
        let before = ids.len();
        for id in new_ids {
            if seen.insert(id.clone()) {
                ids.push(id.clone());
            }
        }
        if ids.len() != before {
            self.replace(scope, &ids).await?;
        }
        tracing::debug!(
            event = "pairq.index.append",
            index = %scope.key(),
            added = ids.len() - before,
            len = ids.len()
        );
        Ok(ids.len())
    }

    pub async fn replace(&self, scope: IndexScope<'_>, ids: &[String]) -> anyhow::Result<()> {
        set_json(self.store.as_ref(), &scope.key(), &ids).await
    }

    pub async fn clear(&self, scope: IndexScope<'_>) -> anyhow::Result<()> {
        self.store.delete(&scope.key()).await
    }

    /// Flags `config_id`'s index as possibly short until [`Self::clear_pending`].
    ///
    /// Set before the global append and cleared after the per-config append,
    /// so a failure in between leaves the flag behind.
    pub async fn mark_pending(&self, config_id: &str) -> anyhow::Result<()> {
        set_json(self.store.as_ref(), &pending_key(config_id), &true).await
    }

    pub async fn clear_pending(&self, config_id: &str) -> anyhow::Result<()> {
        self.store.delete(&pending_key(config_id)).await
    }

    pub async fn is_pending(&self, config_id: &str) -> anyhow::Result<bool> {
        Ok(self.store.get(&pending_key(config_id)).await?.is_some())
    }

    /// Config ids that currently have a per-config index key.
    pub async fn config_ids(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .store
            .list()
            .await?
            .iter()
            .filter_map(|k| config_id_from_key(k).map(str::to_string))
            .collect())
    }
}
