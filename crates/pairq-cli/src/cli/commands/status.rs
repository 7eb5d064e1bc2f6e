use super::{exit_codes, open_queue, print_json};
use crate::cli::args::{StatusArgs, StatusSub};
use pairq_core::errors::ConfigError;
use pairq_core::status::{GenerationState, GenerationStatus};

pub async fn cmd_status(args: StatusArgs) -> anyhow::Result<i32> {
    match args.cmd {
        StatusSub::Get { store, config_id } => {
            let queue = open_queue(&store)?;
            match queue.status.get_status(&config_id).await? {
                Some(status) => {
                    print_json(&status)?;
                    if !status.status.is_terminal() {
                        eprintln!("note: generation for {} has not finished", config_id);
                    }
                }
                None => eprintln!("no status recorded for {}", config_id),
            }
        }
        StatusSub::Set {
            store,
            config_id,
            state,
            message,
        } => {
            let state = GenerationState::parse(&state).ok_or_else(|| {
                ConfigError(format!(
                    "unknown state '{}' (expected pending|generating|complete|error)",
                    state
                ))
            })?;
            let queue = open_queue(&store)?;
            let status = GenerationStatus::new(state, message);
            queue.status.set_status(&config_id, &status).await?;
            print_json(&status)?;
        }
        StatusSub::Clear { store, config_id } => {
            let queue = open_queue(&store)?;
            queue.status.clear_status(&config_id).await?;
            eprintln!("cleared status for {}", config_id);
        }
    }
    Ok(exit_codes::OK)
}
