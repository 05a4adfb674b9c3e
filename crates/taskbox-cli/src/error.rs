use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] taskbox_core::Error),
    #[error(transparent)]
    Config(#[from] taskbox_core::ConfigError),
    #[error(transparent)]
    Transport(#[from] taskbox_core::sync::TransportError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid log filter: {0}")]
    Logging(#[from] tracing_subscriber::filter::ParseError),
    #[error("No task title provided")]
    EmptyTitle,
    #[error("Task ID cannot be empty")]
    EmptyTaskId,
    #[error("Task not found for id/prefix: {0}")]
    TaskNotFound(String),
    #[error("{0}")]
    AmbiguousTaskId(String),
    #[error("Nothing to change: pass --title, --description or --reopen")]
    NothingToEdit,
    #[error("Remote authority is not reachable; changes stay queued")]
    Unreachable,
    #[error("Sync aborted: {0}")]
    SyncAborted(String),
}
