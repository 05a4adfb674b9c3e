use std::path::Path;

use taskbox_core::{CycleOutcome, SyncConfig, SyncReport};

use crate::commands::common::{build_engine, format_report_lines, open_database};
use crate::error::CliError;

/// Run one sync cycle. Item failures are reported but do not fail the command;
/// an unreachable remote or an aborted cycle does.
pub async fn run_sync(
    config: &SyncConfig,
    as_json: bool,
    db_path: &Path,
) -> Result<SyncReport, CliError> {
    let db = open_database(db_path).await?;
    let engine = build_engine(config, db)?;
    let report = engine.run_cycle().await;

    match report.outcome {
        CycleOutcome::Unreachable => return Err(CliError::Unreachable),
        CycleOutcome::Aborted => {
            let message = report
                .errors
                .iter()
                .find(|error| error.is_system())
                .map_or_else(|| "local store failure".to_string(), |error| error.message.clone());
            return Err(CliError::SyncAborted(message));
        }
        CycleOutcome::AlreadyRunning => {
            println!("A sync cycle is already running");
            return Ok(report);
        }
        CycleOutcome::Completed => {}
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_report_lines(&report) {
            println!("{line}");
        }
    }
    Ok(report)
}
