use super::{exit_codes, open_queue, print_json};
use crate::cli::args::DeleteArgs;
use pairq_core::engine::DeleteRequest;
use pairq_core::errors::ConfigError;

pub async fn cmd_delete(args: DeleteArgs) -> anyhow::Result<i32> {
    if args.config_id.is_none() && !args.all {
        return Err(ConfigError("pass --config-id <ID> or --all".into()).into());
    }
    let queue = open_queue(&args.store)?;
    let req = DeleteRequest {
        config_id: args.config_id.clone(),
        full_scan: args.full_scan,
    };
    let outcome = queue.delete_tasks(&req).await?;

    if args.format == "json" {
        print_json(&outcome)?;
    } else {
        println!(
            "deleted {} tasks ({} legacy, {} current, strategy {:?})",
            outcome.deleted_count,
            outcome.legacy_deleted,
            outcome.current_deleted,
            outcome.strategy
        );
    }
    Ok(exit_codes::OK)
}
