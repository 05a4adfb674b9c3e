//! Task model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::{normalize_text_option, now_millis};

/// A unique identifier for a task, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new unique task ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Where a task stands relative to the remote authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Local changes are waiting in the outbox
    #[default]
    Pending,
    /// The remote authority confirmed the latest local change
    Synced,
    /// A change exhausted its retry budget
    Error,
}

impl SyncStatus {
    /// Storage representation
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "error" => Ok(Self::Error),
            other => Err(Error::InvalidInput(format!("unknown sync status: {other}"))),
        }
    }
}

/// A task in the local store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Stable local identifier
    pub id: TaskId,
    /// Identifier assigned by the remote authority on first sync
    pub server_id: Option<String>,
    /// Short title
    pub title: String,
    /// Optional longer description
    pub description: Option<String>,
    /// Completion flag
    pub completed: bool,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last local mutation timestamp (Unix ms), never decreases
    pub updated_at: i64,
    /// Soft delete flag, kept until the deletion has synced
    pub is_deleted: bool,
    /// Sync state of the latest local change
    pub sync_status: SyncStatus,
    /// When the remote authority last confirmed this task (Unix ms)
    pub last_synced_at: Option<i64>,
}

impl Task {
    /// Create a new pending task from validated input
    pub fn new(input: NewTask) -> Result<Self> {
        let title = normalize_title(input.title)?;
        let now = now_millis();
        Ok(Self {
            id: TaskId::new(),
            server_id: None,
            title,
            description: normalize_text_option(input.description),
            completed: false,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            sync_status: SyncStatus::Pending,
            last_synced_at: None,
        })
    }

    /// Apply a partial update, bumping `updated_at` and resetting the status to pending
    pub fn apply_update(&mut self, update: TaskUpdate) -> Result<()> {
        if let Some(title) = update.title {
            self.title = normalize_title(title)?;
        }
        if let Some(description) = update.description {
            self.description = normalize_text_option(Some(description));
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        self.touch();
        Ok(())
    }

    /// Mark the task as deleted (tombstone)
    pub fn mark_deleted(&mut self) {
        self.is_deleted = true;
        self.touch();
    }

    /// Capture the user-visible fields as they are right now
    #[must_use]
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            title: self.title.clone(),
            description: self.description.clone(),
            completed: self.completed,
            is_deleted: self.is_deleted,
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) {
        self.updated_at = now_millis().max(self.updated_at);
        self.sync_status = SyncStatus::Pending;
    }
}

fn normalize_title(title: String) -> Result<String> {
    normalize_text_option(Some(title))
        .ok_or_else(|| Error::InvalidInput("Task title cannot be empty".to_string()))
}

/// Input for creating a task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    /// Task title
    pub title: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}

impl NewTask {
    /// Build input from a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
        }
    }

    /// Attach a description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update for a task; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    /// New title
    #[serde(default)]
    pub title: Option<String>,
    /// New description (an empty string clears it)
    #[serde(default)]
    pub description: Option<String>,
    /// New completion flag
    #[serde(default)]
    pub completed: Option<bool>,
}

/// Field values captured when a change is queued for sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub is_deleted: bool,
    pub updated_at: i64,
}

/// A task version returned by the remote authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub is_deleted: bool,
    pub updated_at: i64,
    #[serde(default)]
    pub server_id: Option<String>,
}
