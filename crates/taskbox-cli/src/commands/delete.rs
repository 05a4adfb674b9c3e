use std::path::Path;

use crate::commands::common::{normalize_task_identifier, open_database, resolve_task_for_delete};
use crate::error::CliError;

pub async fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_task_identifier(id)?;
    let db = open_database(db_path).await?;
    let task = resolve_task_for_delete(&normalized_id, &db).await?;

    db.delete_task(&task.id).await?;
    println!("{}", task.id);
    Ok(())
}
