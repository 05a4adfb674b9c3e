//! Taskbox CLI - Command-line interface for the offline task list
//!
//! Every edit lands locally first; `taskbox sync` pushes queued changes.

mod cli;
mod commands;
mod error;


use clap::Parser;
use taskbox_core::SyncConfig;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::resolve_db_path;
use crate::commands::conflicts::run_conflicts;
use crate::commands::delete::run_delete;
use crate::commands::done::run_done;
use crate::commands::edit::{run_edit, EditRequest};
use crate::commands::list::run_list;
use crate::commands::pending::run_pending;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("taskbox=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Add { title, description } => {
            run_add(&title, description, &db_path).await?;
        }
        Commands::List { json } => run_list(json, &db_path).await?,
        Commands::Done { id } => run_done(&id, &db_path).await?,
        Commands::Edit {
            id,
            title,
            description,
            reopen,
        } => {
            let request = EditRequest {
                title,
                description,
                reopen,
            };
            run_edit(&id, request, &db_path).await?;
        }
        Commands::Delete { id } => run_delete(&id, &db_path).await?,
        Commands::Sync { json } => {
            let config = SyncConfig::from_env()?;
            run_sync(&config, json, &db_path).await?;
        }
        Commands::Status { json } => {
            let config = SyncConfig::from_env()?;
            run_status(&config, json, &db_path).await?;
        }
        Commands::Pending { json } => run_pending(json, &db_path).await?,
        Commands::Conflicts { limit, json } => run_conflicts(limit, json, &db_path).await?,
    }

    Ok(())
}
