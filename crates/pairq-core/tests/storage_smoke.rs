mod common;

use pairq_core::config::{BackendConfig, QueueConfig};
use pairq_core::engine::{DeleteRequest, PopulateOptions};
use pairq_core::index::IndexScope;
use pairq_core::status::GenerationState;
use pairq_core::TaskQueue;

#[tokio::test]
async fn test_sqlite_queue_lifecycle() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut cfg = QueueConfig::in_memory();
    cfg.backend = BackendConfig::Sqlite {
        path: dir.path().join("nested/blobs.db"),
    };
    cfg.stores.current = "smoke-v2".into();

    let r = common::run("cfg", &[("p1", vec![("A", "r1"), ("B", "r2"), ("C", "r3")])]);
    let anchor = PopulateOptions {
        anchor_model_id: "A".into(),
    };

    // 1. Populate and drop the handle
    {
        let q = TaskQueue::open(&cfg)?;
        assert_eq!(q.populate(&r, &anchor).await?.tasks_added, 2);
    }

    // 2. Reopen: indices, tasks and status survived
    let q = TaskQueue::open(&cfg)?;
    assert_eq!(q.index.get(IndexScope::Global).await?.len(), 2);
    assert_eq!(q.count_tasks_for_config("cfg").await?, 2);
    assert_eq!(
        q.status.get_status("cfg").await?.map(|s| s.status),
        Some(GenerationState::Complete)
    );
    assert_eq!(q.populate(&r, &anchor).await?.tasks_added, 0);

    // 3. Delete
    let out = q.delete_tasks(&DeleteRequest::for_config("cfg")).await?;
    assert_eq!(out.current_deleted, 2);
    assert_eq!(q.count_tasks_for_config("cfg").await?, 0);
    Ok(())
}
