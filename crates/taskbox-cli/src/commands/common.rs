use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use taskbox_core::models::SyncConflict;
use taskbox_core::util::normalize_text_option;
use taskbox_core::{
    DatabaseService, HttpBatchTransport, HttpProbe, SyncConfig, SyncEngine, SyncReport,
    SyncStatus, Task, TaskId,
};

use crate::error::CliError;

pub type CliSyncEngine = SyncEngine<DatabaseService, HttpBatchTransport, HttpProbe>;

const SHORT_ID_LEN: usize = 13;

#[derive(Debug, Serialize)]
pub struct TaskListItem {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub sync_status: SyncStatus,
    pub server_id: Option<String>,
    pub is_deleted: bool,
    pub updated_at: i64,
}

pub fn task_to_list_item(task: &Task) -> TaskListItem {
    TaskListItem {
        id: task.id.to_string(),
        title: task.title.clone(),
        description: task.description.clone(),
        completed: task.completed,
        sync_status: task.sync_status,
        server_id: task.server_id.clone(),
        is_deleted: task.is_deleted,
        updated_at: task.updated_at,
    }
}

pub async fn resolve_task(task_query: &str, db: &DatabaseService) -> Result<Task, CliError> {
    if let Ok(task_id) = task_query.parse::<TaskId>() {
        if let Some(task) = db.get_task(&task_id).await? {
            return Ok(task);
        }
    }

    match_task_prefix(task_query, db.list_tasks().await?)
}

/// Like [`resolve_task`], but also finds tombstones whose deletion gave up,
/// so the deletion can be queued again.
pub async fn resolve_task_for_delete(
    task_query: &str,
    db: &DatabaseService,
) -> Result<Task, CliError> {
    let mut candidates = db.list_tasks().await?;
    candidates.extend(
        db.list_tasks_needing_sync()
            .await?
            .into_iter()
            .filter(|task| task.is_deleted && task.sync_status == SyncStatus::Error),
    );
    match_task_prefix(task_query, candidates)
}

fn match_task_prefix(task_query: &str, candidates: Vec<Task>) -> Result<Task, CliError> {
    let query = task_query.to_ascii_lowercase();
    let mut matches = candidates
        .into_iter()
        .filter(|task| task.id.to_string().starts_with(&query))
        .collect::<Vec<_>>();

    match matches.len() {
        0 => Err(CliError::TaskNotFound(task_query.to_string())),
        1 => Ok(matches.remove(0)),
        _ => {
            let options = matches
                .iter()
                .take(3)
                .map(|task| short_id(&task.id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousTaskId(format!(
                "ID prefix '{task_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn short_id(id: &TaskId) -> String {
    id.to_string().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_task_lines(tasks: &[Task]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    tasks
        .iter()
        .map(|task| {
            let checkbox = if task.completed { "[x]" } else { "[ ]" };
            let title = if task.is_deleted {
                format!("{} (deleted)", task_title_preview(task, 30))
            } else {
                task_title_preview(task, 40)
            };
            format!(
                "{:<13}  {checkbox} {title:<40}  {:<7}  {}",
                short_id(&task.id),
                task.sync_status,
                format_relative_time(task.updated_at, now_ms)
            )
        })
        .collect()
}

pub fn task_title_preview(task: &Task, max_chars: usize) -> String {
    if task.title.chars().count() <= max_chars {
        return task.title.clone();
    }
    let preview = task
        .title
        .chars()
        .take(max_chars.saturating_sub(3))
        .collect::<String>();
    format!("{preview}...")
}

pub fn format_report_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Synced {} change(s), {} failed",
        report.succeeded_count, report.failed_count
    )];
    for error in &report.errors {
        let operation = error
            .operation
            .map_or("-", taskbox_core::SyncOperation::as_str);
        let suffix = if error.permanent { " (gave up)" } else { "" };
        lines.push(format!(
            "  {}  {operation:<6}  {}{suffix}",
            error.record_id, error.message
        ));
    }
    lines
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<4}  task={}  local={} remote={}  kept={}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.strategy,
                conflict.task_id,
                conflict.local_updated_at,
                conflict.remote_updated_at,
                conflict.winner.as_str()
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn resolve_task_title(title_parts: &[String]) -> Result<String, CliError> {
    normalize_text_option(Some(title_parts.join(" "))).ok_or(CliError::EmptyTitle)
}

pub fn normalize_task_identifier(id: &str) -> Result<String, CliError> {
    let normalized = id.trim();
    if normalized.is_empty() {
        return Err(CliError::EmptyTaskId);
    }
    Ok(normalized.to_string())
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TASKBOX_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskbox")
        .join("taskbox.db")
}

pub async fn open_database(path: &Path) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(path.to_path_buf()).await?)
}

pub fn build_engine(config: &SyncConfig, db: DatabaseService) -> Result<CliSyncEngine, CliError> {
    let transport = HttpBatchTransport::new(config)?;
    let probe = HttpProbe::new(config)?;
    Ok(SyncEngine::new(config.clone(), db, transport, probe)?)
}
