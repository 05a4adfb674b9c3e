use std::path::Path;

use taskbox_core::TaskUpdate;

use crate::commands::common::{normalize_task_identifier, open_database, resolve_task};
use crate::error::CliError;

pub async fn run_done(id: &str, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_task_identifier(id)?;
    let db = open_database(db_path).await?;
    let task = resolve_task(&normalized_id, &db).await?;

    let update = TaskUpdate {
        completed: Some(true),
        ..TaskUpdate::default()
    };
    db.update_task(&task.id, update).await?;
    println!("{}", task.id);
    Ok(())
}
