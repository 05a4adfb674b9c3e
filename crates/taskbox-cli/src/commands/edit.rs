use std::path::Path;

use taskbox_core::TaskUpdate;

use crate::commands::common::{normalize_task_identifier, open_database, resolve_task};
use crate::error::CliError;

/// Field changes requested on the command line
#[derive(Debug, Default)]
pub struct EditRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub reopen: bool,
}

impl EditRequest {
    fn into_update(self) -> Option<TaskUpdate> {
        if self.title.is_none() && self.description.is_none() && !self.reopen {
            return None;
        }
        Some(TaskUpdate {
            title: self.title,
            description: self.description,
            completed: self.reopen.then_some(false),
        })
    }
}

pub async fn run_edit(id: &str, request: EditRequest, db_path: &Path) -> Result<(), CliError> {
    let normalized_id = normalize_task_identifier(id)?;
    let update = request.into_update().ok_or(CliError::NothingToEdit)?;

    let db = open_database(db_path).await?;
    let task = resolve_task(&normalized_id, &db).await?;
    db.update_task(&task.id, update).await?;
    println!("{}", task.id);
    Ok(())
}
