use std::path::Path;

use crate::commands::common::{format_task_lines, open_database, task_to_list_item, TaskListItem};
use crate::error::CliError;

/// Tasks whose latest change has not been confirmed, tombstones included.
pub async fn run_pending(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let tasks = db.list_tasks_needing_sync().await?;

    if as_json {
        let json_items = tasks
            .iter()
            .map(task_to_list_item)
            .collect::<Vec<TaskListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if tasks.is_empty() {
        println!("Everything is synced.");
        return Ok(());
    }

    for line in format_task_lines(&tasks) {
        println!("{line}");
    }
    Ok(())
}
