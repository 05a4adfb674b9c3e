use std::path::Path;

use taskbox_core::{SyncConfig, SyncStatusSnapshot};

use crate::commands::common::{build_engine, open_database};
use crate::error::CliError;

pub async fn run_status(
    config: &SyncConfig,
    as_json: bool,
    db_path: &Path,
) -> Result<SyncStatusSnapshot, CliError> {
    let db = open_database(db_path).await?;
    let engine = build_engine(config, db)?;
    let status = engine.status().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(status);
    }

    println!("Pending changes: {}", status.pending_items);
    match status.last_sync {
        Some(last_sync) => println!(
            "Last sync:       {}",
            last_sync.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("Last sync:       never"),
    }
    println!(
        "Remote:          {}",
        if status.server_reachable {
            "reachable"
        } else {
            "unreachable"
        }
    );
    Ok(status)
}
