use std::path::Path;

use taskbox_core::NewTask;

use crate::commands::common::{open_database, resolve_task_title};
use crate::error::CliError;

pub async fn run_add(
    title_parts: &[String],
    description: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let title = resolve_task_title(title_parts)?;
    let mut input = NewTask::new(title);
    input.description = description;

    let db = open_database(db_path).await?;
    let task = db.create_task(&input).await?;
    println!("{}", task.id);
    Ok(())
}
