use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "taskbox")]
#[command(about = "Offline-first task list that syncs when the remote is reachable")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new task
    #[command(alias = "new")]
    Add {
        /// Task title
        title: Vec<String>,
        /// Optional longer description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List tasks, most recently updated first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a task as completed
    Done {
        /// Task ID or unique ID prefix
        id: String,
    },
    /// Edit an existing task
    Edit {
        /// Task ID or unique ID prefix
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description (empty string clears it)
        #[arg(long)]
        description: Option<String>,
        /// Mark the task as not completed
        #[arg(long)]
        reopen: bool,
    },
    /// Delete an existing task
    Delete {
        /// Task ID or unique ID prefix
        id: String,
    },
    /// Push queued changes to the remote authority
    Sync {
        /// Output the cycle report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show outbox size, last sync and remote reachability
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List tasks with unsynced or failed changes
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recently resolved sync conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
