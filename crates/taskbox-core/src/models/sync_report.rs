//! Sync cycle report model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::outbox::{OutboxEntry, SyncOperation};

/// Record id used for errors that are not tied to a single task.
pub const SYSTEM_RECORD_ID: &str = "system";

/// How a sync cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
    /// Every eligible entry was exchanged and reconciled
    Completed,
    /// The remote authority was not reachable, nothing was attempted
    Unreachable,
    /// Another cycle was in flight, nothing was attempted
    AlreadyRunning,
    /// The local store failed mid-cycle; remaining entries were left untouched
    Aborted,
}

/// One failed item (or a system-level failure) observed during a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncErrorEntry {
    /// Task id, or [`SYSTEM_RECORD_ID`]
    pub record_id: String,
    /// Operation of the failed entry; `None` for system errors
    pub operation: Option<SyncOperation>,
    pub message: String,
    pub observed_at: DateTime<Utc>,
    /// Whether this failure exhausted the entry's retry budget
    pub permanent: bool,
}

impl SyncErrorEntry {
    /// Error for a single outbox entry.
    pub fn for_entry(entry: &OutboxEntry, message: impl Into<String>, permanent: bool) -> Self {
        Self {
            record_id: entry.task_id.to_string(),
            operation: Some(entry.operation),
            message: message.into(),
            observed_at: Utc::now(),
            permanent,
        }
    }

    /// Error that is not tied to a task, such as a store failure.
    pub fn system(message: impl Into<String>) -> Self {
        Self {
            record_id: SYSTEM_RECORD_ID.to_string(),
            operation: None,
            message: message.into(),
            observed_at: Utc::now(),
            permanent: false,
        }
    }

    pub fn is_system(&self) -> bool {
        self.record_id == SYSTEM_RECORD_ID
    }
}

/// Summary of one sync cycle. Produced fresh each cycle and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub outcome: CycleOutcome,
    pub succeeded_count: usize,
    pub failed_count: usize,
    pub errors: Vec<SyncErrorEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    /// Empty report for a cycle that is starting now.
    pub fn start() -> Self {
        let now = Utc::now();
        Self {
            outcome: CycleOutcome::Completed,
            succeeded_count: 0,
            failed_count: 0,
            errors: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    /// Report for a cycle that ended before touching the outbox.
    pub fn skipped(outcome: CycleOutcome) -> Self {
        Self {
            outcome,
            ..Self::start()
        }
    }

    pub fn record_success(&mut self) {
        self.succeeded_count += 1;
    }

    pub fn record_failure(&mut self, error: SyncErrorEntry) {
        self.failed_count += 1;
        self.errors.push(error);
    }

    /// Stop the cycle because of a store failure.
    pub fn abort(&mut self, message: impl Into<String>) {
        self.outcome = CycleOutcome::Aborted;
        self.errors.push(SyncErrorEntry::system(message));
    }

    #[must_use]
    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// True when no entry failed and no system error was recorded.
    ///
    /// Partial success is representable: check `succeeded_count` alongside.
    pub fn is_success(&self) -> bool {
        self.failed_count == 0 && !self.errors.iter().any(SyncErrorEntry::is_system)
    }
}
