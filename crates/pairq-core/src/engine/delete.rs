use crate::engine::pool::run_bounded;
use crate::index::{IndexScope, CONFIG_INDEX_PREFIX, PENDING_PREFIX};
use crate::model::PairwiseTask;
use crate::queue::TaskQueue;
use crate::storage::{get_json, BlobStore};
use crate::task_id::looks_like_task_id;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct DeleteRequest {
    /// Restrict deletion to one configuration. `None` deletes everything.
    pub config_id: Option<String>,
    /// Skip the per-config index and scan the whole global index.
    pub full_scan: bool,
}

impl DeleteRequest {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_config(config_id: impl Into<String>) -> Self {
        Self {
            config_id: Some(config_id.into()),
            full_scan: false,
        }
    }
}

/// How the current store's targets were found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStrategy {
    /// Every task in the global index.
    All,
    /// Ids from the per-config index.
    ConfigIndex,
    /// Every task in the global index fetched and filtered by config id.
    GlobalScan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub deleted_count: usize,
    pub legacy_deleted: usize,
    pub current_deleted: usize,
    pub strategy: ScanStrategy,
}

/// Deletes `keys` from `store` through the bounded pool.
async fn delete_keys(
    q: &TaskQueue,
    store: Arc<dyn BlobStore>,
    keys: Vec<String>,
) -> anyhow::Result<usize> {
    run_bounded("delete_task", keys, q.pool_options(), move |key: String| {
        let store = store.clone();
        async move { store.delete(&key).await }
    })
    .await
}

/// Fetches every task in `ids`, skipping ids whose object is gone.
pub(crate) async fn fetch_tasks(
    q: &TaskQueue,
    ids: &[String],
) -> anyhow::Result<Vec<(String, Option<PairwiseTask>)>> {
    let out = Arc::new(tokio::sync::Mutex::new(Vec::with_capacity(ids.len())));
    let store = q.tasks.clone();
    let sink = out.clone();
    run_bounded("fetch_task", ids.to_vec(), q.pool_options(), move |id: String| {
        let store = store.clone();
        let sink = sink.clone();
        async move {
            let task = get_json::<PairwiseTask>(store.as_ref(), &id).await?;
            if task.is_none() {
                tracing::debug!(event = "pairq.index.dangling", task_id = %id);
            }
            sink.lock().await.push((id, task));
            Ok(())
        }
    })
    .await?;
    let fetched = std::mem::take(&mut *out.lock().await);
    Ok(fetched)
}

impl TaskQueue {
    /// Deletes tasks from the legacy and the current generation.
    pub async fn delete_tasks(&self, req: &DeleteRequest) -> anyhow::Result<DeleteOutcome> {
        let _writer = self.index.write_lock().await?;

        let legacy_deleted = self.delete_legacy(req.config_id.as_deref()).await?;
        let (current_deleted, strategy) = match req.config_id.as_deref() {
            None => (self.delete_all_current().await?, ScanStrategy::All),
            Some(cfg) => self.delete_current_for_config(cfg, req.full_scan).await?,
        };

        let outcome = DeleteOutcome {
            deleted_count: legacy_deleted + current_deleted,
            legacy_deleted,
            current_deleted,
            strategy,
        };
        tracing::info!(
            event = "pairq.delete.done",
            config_id = ?req.config_id,
            deleted = outcome.deleted_count,
            legacy = legacy_deleted,
            current = current_deleted,
            strategy = ?strategy
        );
        Ok(outcome)
    }

    async fn delete_legacy(&self, config_id: Option<&str>) -> anyhow::Result<usize> {
        let Some(legacy) = self.legacy.clone() else {
            return Ok(0);
        };
        if let Some(cfg) = config_id {
            tracing::warn!(
                event = "pairq.delete.legacy_unscoped",
                config_id = %cfg,
                store = %legacy.store_name(),
                "legacy store has no index; deleting every key instead of one configuration"
            );
        }
        let keys = legacy.list().await?;
        delete_keys(self, legacy, keys).await
    }

    async fn delete_all_current(&self) -> anyhow::Result<usize> {
        let mut ids = self.index.get(IndexScope::Global).await?;
        let keys = self.tasks.list().await?;

        // Tasks written by a populate that died before its index append.
        let indexed: HashSet<String> = ids.iter().cloned().collect();
        let orphans: Vec<String> = keys
            .iter()
            .filter(|k| looks_like_task_id(k) && !indexed.contains(*k))
            .cloned()
            .collect();
        if !orphans.is_empty() {
            tracing::warn!(
                event = "pairq.delete.orphans",
                count = orphans.len(),
                "removing task records missing from the global index"
            );
            ids.extend(orphans);
        }

        let deleted = delete_keys(self, self.tasks.clone(), ids).await?;
        self.index.replace(IndexScope::Global, &[]).await?;
        let config_keys: Vec<String> = keys
            .into_iter()
            .filter(|k| k.starts_with(CONFIG_INDEX_PREFIX) || k.starts_with(PENDING_PREFIX))
            .collect();
        delete_keys(self, self.tasks.clone(), config_keys).await?;
        Ok(deleted)
    }

    async fn delete_current_for_config(
        &self,
        config_id: &str,
        full_scan: bool,
    ) -> anyhow::Result<(usize, ScanStrategy)> {
        let global = self.index.get(IndexScope::Global).await?;

        let from_index = if full_scan {
            None
        } else {
            self.config_targets(config_id, &global).await?
        };

        let (targets, strategy) = match from_index {
            Some(ids) => (ids, ScanStrategy::ConfigIndex),
            None => (
                self.scan_for_config(config_id, &global).await?,
                ScanStrategy::GlobalScan,
            ),
        };

        let doomed: HashSet<&String> = targets.iter().collect();
        let remaining: Vec<String> = global
            .iter()
            .filter(|id| !doomed.contains(id))
            .cloned()
            .collect();
        let deleted = delete_keys(self, self.tasks.clone(), targets.clone()).await?;

        if remaining.len() != global.len() {
            self.index.replace(IndexScope::Global, &remaining).await?;
        }
        self.index.clear(IndexScope::Config(config_id)).await?;
        self.index.clear_pending(config_id).await?;
        Ok((deleted, strategy))
    }

    /// Targets from the per-config index, or `None` when it cannot be trusted:
    /// an append is pending, the index is empty, or it names ids the global
    /// index no longer has.
    async fn config_targets(
        &self,
        config_id: &str,
        global: &[String],
    ) -> anyhow::Result<Option<Vec<String>>> {
        if self.index.is_pending(config_id).await? {
            tracing::warn!(
                event = "pairq.index.pending",
                config_id = %config_id,
                "per-config index has an unfinished append; falling back to full scan"
            );
            return Ok(None);
        }
        let ids = self.index.get(IndexScope::Config(config_id)).await?;
        if ids.is_empty() {
            return Ok(None);
        }
        let in_global: HashSet<&String> = global.iter().collect();
        if let Some(stray) = ids.iter().find(|id| !in_global.contains(id)) {
            tracing::warn!(
                event = "pairq.index.stale",
                config_id = %config_id,
                task_id = %stray,
                "per-config index references an id missing from the global index; falling back to full scan"
            );
            return Ok(None);
        }
        Ok(Some(ids))
    }

    /// Fetches every task in `global` and keeps the ids owned by `config_id`.
    pub(crate) async fn scan_for_config(
        &self,
        config_id: &str,
        global: &[String],
    ) -> anyhow::Result<Vec<String>> {
        let fetched = fetch_tasks(self, global).await?;
        let matching: HashSet<String> = fetched
            .into_iter()
            .filter_map(|(id, task)| match task {
                Some(t) if t.config_id == config_id => Some(id),
                _ => None,
            })
            .collect();
        // keep index order
        Ok(global
            .iter()
            .filter(|id| matching.contains(*id))
            .cloned()
            .collect())
    }
}
