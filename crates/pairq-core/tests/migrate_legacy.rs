mod common;

use common::fixture;
use pairq_core::engine::MigrateOptions;
use pairq_core::index::IndexScope;
use pairq_core::model::{PairwiseTask, TASK_SCHEMA_VERSION};
use pairq_core::storage::{get_json, BlobStore};

fn legacy_record(task_id: &str, config_id: &str) -> serde_json::Value {
    serde_json::json!({
        "taskId": task_id,
        "prompt": { "system": null, "messages": [{ "role": "user", "content": "q" }] },
        "responseA": "r1",
        "responseB": "r2",
        "modelIdA": "A",
        "modelIdB": "B",
        "configId": config_id
    })
}

async fn seed(legacy: &dyn BlobStore) -> anyhow::Result<()> {
    legacy.set("k1", &legacy_record("k1", "X")).await?;
    legacy.set("k2", &legacy_record("k2", "X")).await?;
    legacy.set("k3", &legacy_record("k3", "Y")).await?;
    legacy.set("junk", &serde_json::json!({ "hello": "world" })).await?;
    Ok(())
}

#[tokio::test]
async fn test_migration_builds_both_indices() -> anyhow::Result<()> {
    let fx = fixture("migrate");
    seed(&fx.legacy).await?;

    let report = fx.queue.migrate_legacy(&MigrateOptions::default()).await?;
    assert_eq!(report.scanned, 4);
    assert_eq!(report.migrated, 3);
    assert_eq!(report.invalid, 1);
    assert_eq!(report.legacy_deleted, 0);
    assert_eq!(report.per_config.get("X"), Some(&2));

    assert_eq!(fx.queue.index.get(IndexScope::Global).await?.len(), 3);
    assert_eq!(fx.queue.index.get(IndexScope::Config("X")).await?.len(), 2);
    assert_eq!(fx.queue.index.get(IndexScope::Config("Y")).await?.len(), 1);

    let t: PairwiseTask = get_json(&fx.tasks, "k1").await?.unwrap();
    assert_eq!(t.schema_version, TASK_SCHEMA_VERSION);
    assert!(!t.is_legacy());
    assert_eq!(fx.legacy.len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_migration_is_idempotent() -> anyhow::Result<()> {
    let fx = fixture("migrate-twice");
    seed(&fx.legacy).await?;

    fx.queue.migrate_legacy(&MigrateOptions::default()).await?;
    let again = fx.queue.migrate_legacy(&MigrateOptions::default()).await?;
    assert_eq!(again.migrated, 0);
    assert_eq!(again.already_present, 3);
    assert_eq!(fx.queue.index.get(IndexScope::Global).await?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_dry_run_writes_nothing() -> anyhow::Result<()> {
    let fx = fixture("migrate-dry");
    seed(&fx.legacy).await?;

    let report = fx
        .queue
        .migrate_legacy(&MigrateOptions {
            delete_legacy: true,
            dry_run: true,
        })
        .await?;
    assert_eq!(report.migrated, 3);
    assert!(fx.tasks.is_empty());
    assert_eq!(fx.legacy.len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_delete_legacy_keeps_unparseable_records() -> anyhow::Result<()> {
    let fx = fixture("migrate-delete");
    seed(&fx.legacy).await?;

    let report = fx
        .queue
        .migrate_legacy(&MigrateOptions {
            delete_legacy: true,
            dry_run: false,
        })
        .await?;
    assert_eq!(report.legacy_deleted, 3);
    assert_eq!(fx.legacy.list().await?, vec!["junk".to_string()]);
    assert_eq!(fx.queue.count_tasks_for_config("X").await?, 2);
    Ok(())
}

#[tokio::test]
async fn test_duplicate_legacy_task_ids_migrate_once() -> anyhow::Result<()> {
    let fx = fixture("migrate-dup");
    fx.legacy.set("k1", &legacy_record("same", "X")).await?;
    fx.legacy.set("k2", &legacy_record("same", "X")).await?;

    let report = fx.queue.migrate_legacy(&MigrateOptions::default()).await?;
    assert_eq!(report.scanned, 2);
    assert_eq!(report.migrated, 1);
    assert_eq!(report.already_present, 1);
    assert_eq!(report.per_config.get("X"), Some(&1));
    assert_eq!(fx.queue.index.get(IndexScope::Global).await?, vec!["same".to_string()]);
    assert!(!fx.queue.index.is_pending("X").await?);
    Ok(())
}
