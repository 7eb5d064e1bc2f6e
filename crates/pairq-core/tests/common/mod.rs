#![allow(dead_code)]

use async_trait::async_trait;
use pairq_core::config::QueueSettings;
use pairq_core::index::CONFIG_INDEX_PREFIX;
use pairq_core::model::{EvaluationRun, PairwiseTask, PromptContext, RunConfig, TaskPrompt};
use pairq_core::storage::{set_json, BlobStore, MemoryBlobStore};
use pairq_core::TaskQueue;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Fixture {
    pub queue: TaskQueue,
    pub tasks: MemoryBlobStore,
    pub legacy: MemoryBlobStore,
    pub status: MemoryBlobStore,
}

/// Fresh in-memory queue. `name` keeps writer locks of parallel tests apart.
pub fn fixture(name: &str) -> Fixture {
    let tasks = MemoryBlobStore::new(format!("{}-v2", name));
    let legacy = MemoryBlobStore::new(format!("{}-legacy", name));
    let status = MemoryBlobStore::new(format!("{}-status", name));
    let settings = QueueSettings {
        concurrency: 4,
        progress_every: 2,
        ..QueueSettings::default()
    };
    let queue = TaskQueue::new(
        Arc::new(tasks.clone()),
        Some(Arc::new(legacy.clone())),
        Arc::new(status.clone()),
        settings,
    );
    Fixture {
        queue,
        tasks,
        legacy,
        status,
    }
}

/// Builds a run from `(prompt_id, [(model_id, response)])` rows.
pub fn run(config_id: &str, prompts: &[(&str, Vec<(&str, &str)>)]) -> EvaluationRun {
    let mut responses = BTreeMap::new();
    let mut contexts = BTreeMap::new();
    for (pid, models) in prompts {
        responses.insert(
            pid.to_string(),
            models
                .iter()
                .map(|(m, r)| (m.to_string(), r.to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
        contexts.insert(pid.to_string(), PromptContext::Text(format!("prompt text {}", pid)));
    }
    EvaluationRun {
        config: Some(RunConfig {
            id: config_id.to_string(),
            title: None,
        }),
        prompt_ids: prompts.iter().map(|(p, _)| p.to_string()).collect(),
        prompt_contexts: Some(contexts),
        all_final_assistant_responses: Some(responses),
        model_system_prompts: BTreeMap::new(),
    }
}

pub fn task(task_id: &str, config_id: &str) -> PairwiseTask {
    PairwiseTask {
        task_id: task_id.to_string(),
        prompt: TaskPrompt {
            system: None,
            messages: vec![],
        },
        response_a: "a".into(),
        response_b: "b".into(),
        model_id_a: "A".into(),
        model_id_b: "B".into(),
        config_id: config_id.to_string(),
        schema_version: 2,
    }
}

pub async fn put(store: &dyn BlobStore, t: &PairwiseTask) -> anyhow::Result<()> {
    set_json(store, &t.task_id, t).await
}

/// Memory store whose per-config index writes fail while `broken` is set.
#[derive(Clone)]
pub struct FlakyIndexStore {
    pub inner: MemoryBlobStore,
    pub broken: Arc<AtomicBool>,
}

impl FlakyIndexStore {
    pub fn new(name: &str) -> Self {
        Self {
            inner: MemoryBlobStore::new(name),
            broken: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_broken(&self, broken: bool) {
        self.broken.store(broken, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for FlakyIndexStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
        if key.starts_with(CONFIG_INDEX_PREFIX) && self.broken.load(Ordering::SeqCst) {
            anyhow::bail!("write to {} refused", key);
        }
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.inner.delete(key).await
    }

    async fn list(&self) -> anyhow::Result<Vec<String>> {
        self.inner.list().await
    }

    fn store_name(&self) -> &str {
        self.inner.store_name()
    }
}

/// Queue over a [`FlakyIndexStore`] task store and no legacy store.
pub fn flaky_queue(name: &str) -> (TaskQueue, FlakyIndexStore) {
    let tasks = FlakyIndexStore::new(&format!("{}-v2", name));
    let settings = QueueSettings {
        concurrency: 4,
        ..QueueSettings::default()
    };
    let queue = TaskQueue::new(
        Arc::new(tasks.clone()),
        None,
        Arc::new(MemoryBlobStore::new(format!("{}-status", name))),
        settings,
    );
    (queue, tasks)
}
