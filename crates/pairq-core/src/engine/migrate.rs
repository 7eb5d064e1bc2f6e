//! Moves task records from the flat legacy store into the indexed store.

use crate::engine::pool::run_bounded;
use crate::index::{is_reserved_key, IndexScope};
use crate::model::{PairwiseTask, TASK_SCHEMA_VERSION};
use crate::queue::TaskQueue;
use crate::storage::{set_json, BlobStore};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct MigrateOptions {
    /// Remove migrated records from the legacy store afterwards.
    pub delete_legacy: bool,
    /// Report what would happen without writing anything.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub scanned: usize,
    pub migrated: usize,
    pub already_present: usize,
    pub invalid: usize,
    pub legacy_deleted: usize,
    /// Migrated task count per config id.
    pub per_config: BTreeMap<String, usize>,
}

impl TaskQueue {
    /// Copies every legacy record into the current store and indexes it.
    ///
    /// Stored task ids are kept as-is. Running it again only re-indexes what
    /// is missing.
    pub async fn migrate_legacy(&self, opts: &MigrateOptions) -> anyhow::Result<MigrationReport> {
        let Some(legacy) = self.legacy.clone() else {
            anyhow::bail!("no legacy store configured");
        };
        let _writer = self.index.write_lock().await?;

        let mut report = MigrationReport::default();
        let known: HashSet<String> = self.index.get(IndexScope::Global).await?.into_iter().collect();

        let mut fresh: Vec<PairwiseTask> = Vec::new();
        let mut queued: HashSet<String> = HashSet::new();
        let mut seen_legacy: Vec<String> = Vec::new();
        for key in legacy.list().await? {
            if is_reserved_key(&key) {
                continue;
            }
            report.scanned += 1;
            let Some(raw) = legacy.get(&key).await? else {
                continue;
            };
            let mut task: PairwiseTask = match serde_json::from_value(raw) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(
                        event = "pairq.migrate.invalid_record",
                        key = %key,
                        error = %e,
                        "skipping legacy record that is not a pairwise task"
                    );
                    report.invalid += 1;
                    continue;
                }
            };
            seen_legacy.push(key.clone());
            if task.task_id.is_empty() {
                task.task_id = key;
            }
            if known.contains(&task.task_id) || !queued.insert(task.task_id.clone()) {
                report.already_present += 1;
                continue;
            }
            task.schema_version = TASK_SCHEMA_VERSION;
            *report.per_config.entry(task.config_id.clone()).or_default() += 1;
            fresh.push(task);
        }
        report.migrated = fresh.len();

        if opts.dry_run {
            tracing::info!(event = "pairq.migrate.dry_run", report = ?report);
            return Ok(report);
        }

        let mut by_config: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for t in &fresh {
            by_config
                .entry(t.config_id.clone())
                .or_default()
                .push(t.task_id.clone());
        }
        let new_ids: Vec<String> = fresh.iter().map(|t| t.task_id.clone()).collect();

        let store = self.tasks.clone();
        run_bounded("migrate_task", fresh, self.pool_options(), move |task| {
            let store = store.clone();
            async move { set_json(store.as_ref(), &task.task_id, &task).await }
        })
        .await?;

        for cfg in by_config.keys() {
            self.index.mark_pending(cfg).await?;
        }
        self.index.append_unique(IndexScope::Global, &new_ids).await?;
        for (cfg, ids) in &by_config {
            self.index.append_unique(IndexScope::Config(cfg), ids).await?;
            self.index.clear_pending(cfg).await?;
        }

        if opts.delete_legacy {
            let legacy_store: Arc<dyn BlobStore> = legacy;
            report.legacy_deleted =
                run_bounded("delete_legacy", seen_legacy, self.pool_options(), move |key: String| {
                    let store = legacy_store.clone();
                    async move { store.delete(&key).await }
                })
                .await?;
        }

        tracing::info!(
            event = "pairq.migrate.done",
            scanned = report.scanned,
            migrated = report.migrated,
            already_present = report.already_present,
            invalid = report.invalid,
            legacy_deleted = report.legacy_deleted
        );
        Ok(report)
    }
}
