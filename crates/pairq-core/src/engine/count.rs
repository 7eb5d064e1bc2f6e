use crate::engine::delete::fetch_tasks;
use crate::index::IndexScope;
use crate::queue::TaskQueue;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub global_index_len: usize,
    pub config_index_len: usize,
    pub tasks_for_config: usize,
}

impl TaskQueue {
    /// Counts stored tasks whose `config_id` matches.
    ///
    /// Reads the per-config index when present and complete, and falls back to
    /// a scan of the global index otherwise. Ids whose object is missing are skipped.
    pub async fn count_tasks_for_config(&self, config_id: &str) -> anyhow::Result<usize> {
        let scoped = if self.index.is_pending(config_id).await? {
            Vec::new()
        } else {
            self.index.get(IndexScope::Config(config_id)).await?
        };
        let ids = if scoped.is_empty() {
            self.index.get(IndexScope::Global).await?
        } else {
            scoped
        };

        let n = fetch_tasks(self, &ids)
            .await?
            .into_iter()
            .filter(|(_, task)| matches!(task, Some(t) if t.config_id == config_id))
            .count();
        Ok(n)
    }

    pub async fn stats(&self, config_id: &str) -> anyhow::Result<QueueStats> {
        Ok(QueueStats {
            global_index_len: self.index.get(IndexScope::Global).await?.len(),
            config_index_len: self.index.get(IndexScope::Config(config_id)).await?.len(),
            tasks_for_config: self.count_tasks_for_config(config_id).await?,
        })
    }
}
