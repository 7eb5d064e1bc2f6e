use super::args::*;
use pairq_core::config::{load_config, QueueConfig};
use pairq_core::errors::ConfigError;
use pairq_core::index::IndexScope;
use pairq_core::queue::Backend;
use pairq_core::storage::SiteCredentials;
use pairq_core::TaskQueue;

pub mod delete;
pub mod migrate;
pub mod populate;
pub mod status;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let res = match cli.cmd {
        Command::Init(args) => cmd_init(args),
        Command::Populate(args) => populate::cmd_populate(args).await,
        Command::Delete(args) => delete::cmd_delete(args).await,
        Command::Count(args) => cmd_count(args).await,
        Command::Index(args) => cmd_index(args).await,
        Command::Status(args) => status::cmd_status(args).await,
        Command::Migrate(args) => migrate::cmd_migrate(args).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    };

    match res {
        Err(e) if e.downcast_ref::<ConfigError>().is_some() => {
            eprintln!("{}", e);
            Ok(exit_codes::CONFIG_ERROR)
        }
        other => other,
    }
}

fn cmd_init(args: InitArgs) -> anyhow::Result<i32> {
    if args.config.exists() {
        eprintln!("note: {} already exists", args.config.display());
        return Ok(exit_codes::OK);
    }
    if let Some(parent) = args.config.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    pairq_core::config::write_sample_config(&args.config)?;
    eprintln!("created {}", args.config.display());
    Ok(exit_codes::OK)
}

pub(crate) fn load(store: &StoreArgs) -> Result<QueueConfig, ConfigError> {
    load_config(&store.config, store.strict)
}

pub(crate) fn open_queue(store: &StoreArgs) -> anyhow::Result<TaskQueue> {
    let cfg = load(store)?;
    let site = match (&store.site_id, &store.token) {
        (Some(site_id), Some(token)) => Some(SiteCredentials {
            site_id: site_id.clone(),
            token: token.clone(),
        }),
        _ => None,
    };
    let backend = Backend::from_config(&cfg)?;
    TaskQueue::open_with(&backend, &cfg, site)
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_count(args: CountArgs) -> anyhow::Result<i32> {
    let queue = open_queue(&args.store)?;
    if args.format == "json" {
        print_json(&queue.stats(&args.config_id).await?)?;
    } else {
        println!("{}", queue.count_tasks_for_config(&args.config_id).await?);
    }
    Ok(exit_codes::OK)
}

async fn cmd_index(args: IndexArgs) -> anyhow::Result<i32> {
    let queue = open_queue(&args.store)?;
    let scope = match args.config_id.as_deref() {
        Some(id) => IndexScope::Config(id),
        None => IndexScope::Global,
    };
    let ids = queue.index.get(scope).await?;
    if args.ids {
        for id in &ids {
            println!("{}", id);
        }
    } else {
        println!("{}", ids.len());
    }
    Ok(exit_codes::OK)
}
