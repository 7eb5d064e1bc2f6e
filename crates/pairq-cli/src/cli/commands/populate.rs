use super::{exit_codes, load, open_queue, print_json};
use crate::cli::args::PopulateArgs;
use anyhow::Context;
use pairq_core::engine::PopulateOptions;
use pairq_core::errors::ConfigError;
use pairq_core::model::EvaluationRun;

pub async fn cmd_populate(args: PopulateArgs) -> anyhow::Result<i32> {
    let cfg = load(&args.store)?;
    let anchor = args
        .anchor
        .clone()
        .or(cfg.queue.anchor_model.clone())
        .ok_or_else(|| {
            ConfigError("no anchor model: pass --anchor or set queue.anchor_model".into())
        })?;

    let raw = tokio::fs::read_to_string(&args.run)
        .await
        .with_context(|| format!("failed to read run file {}", args.run.display()))?;
    let run: EvaluationRun = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse run file {}", args.run.display()))?;

    tracing::debug!(
        event = "pairq.cli.populate",
        run = %args.run.display(),
        config_id = ?run.config_id(),
        anchor = %anchor
    );
    let queue = open_queue(&args.store)?;
    let outcome = queue
        .populate(
            &run,
            &PopulateOptions {
                anchor_model_id: anchor,
            },
        )
        .await?;

    if args.format == "json" {
        print_json(&outcome)?;
    } else {
        println!(
            "added {} tasks (queue {} -> {})",
            outcome.tasks_added, outcome.count_before, outcome.count_after
        );
        if !outcome.prompts_skipped.is_empty() {
            println!("skipped prompts: {}", outcome.prompts_skipped.join(", "));
        }
    }
    Ok(exit_codes::OK)
}
