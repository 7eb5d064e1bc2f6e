use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pairq",
    version,
    about = "Pairwise comparison task queue for human rating of model runs"
)]
pub struct Cli {
    /// emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a sample pairq.yaml
    Init(InitArgs),
    /// Turn an evaluation run into pairwise tasks
    Populate(PopulateArgs),
    /// Delete tasks, optionally for one configuration
    Delete(DeleteArgs),
    /// Count stored tasks for a configuration
    Count(CountArgs),
    /// Show a task index
    Index(IndexArgs),
    /// Read or write a generation status record
    Status(StatusArgs),
    /// Copy legacy records into the indexed store
    Migrate(MigrateArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, default_value = "pairq.yaml")]
    pub config: PathBuf,

    /// fail on unknown config fields
    #[arg(long)]
    pub strict: bool,

    /// route every store through this site (overrides config and env)
    #[arg(long, requires = "token")]
    pub site_id: Option<String>,

    #[arg(long, requires = "site_id")]
    pub token: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    #[arg(long, default_value = "pairq.yaml")]
    pub config: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct PopulateArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// evaluation run result (JSON)
    #[arg(long)]
    pub run: PathBuf,

    /// anchor model id (defaults to queue.anchor_model)
    #[arg(long)]
    pub anchor: Option<String>,

    #[arg(long, default_value = "text")]
    pub format: String, // text|json
}

#[derive(clap::Args, Debug, Clone)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub config_id: Option<String>,

    /// delete every task in both generations
    #[arg(long, conflicts_with = "config_id")]
    pub all: bool,

    /// ignore the per-config index and scan the global index
    #[arg(long)]
    pub full_scan: bool,

    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CountArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub config_id: String,

    #[arg(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct IndexArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// show the per-config index instead of the global one
    #[arg(long)]
    pub config_id: Option<String>,

    /// print the ids, not just the length
    #[arg(long)]
    pub ids: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(subcommand)]
    pub cmd: StatusSub,
}

#[derive(Subcommand, Debug, Clone)]
pub enum StatusSub {
    Get {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        config_id: String,
    },
    Set {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        config_id: String,
        /// pending|generating|complete|error
        #[arg(long)]
        state: String,
        #[arg(long, default_value = "")]
        message: String,
    },
    Clear {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        config_id: String,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// remove migrated records from the legacy store
    #[arg(long)]
    pub delete_legacy: bool,

    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, default_value = "text")]
    pub format: String,
}
