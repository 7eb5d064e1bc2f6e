use super::{exit_codes, open_queue, print_json};
use crate::cli::args::MigrateArgs;
use pairq_core::engine::MigrateOptions;

pub async fn cmd_migrate(args: MigrateArgs) -> anyhow::Result<i32> {
    let queue = open_queue(&args.store)?;
    let report = queue
        .migrate_legacy(&MigrateOptions {
            delete_legacy: args.delete_legacy,
            dry_run: args.dry_run,
        })
        .await?;

    if args.format == "json" {
        print_json(&report)?;
        return Ok(exit_codes::OK);
    }

    let prefix = if args.dry_run { "[dry-run] " } else { "" };
    println!(
        "{}scanned {}, migrated {}, already present {}, invalid {}",
        prefix, report.scanned, report.migrated, report.already_present, report.invalid
    );
    for (config_id, n) in &report.per_config {
        println!("  {}: {}", config_id, n);
    }
    if args.delete_legacy && !args.dry_run {
        println!("removed {} legacy records", report.legacy_deleted);
    }
    Ok(exit_codes::OK)
}
