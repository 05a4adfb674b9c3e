//! The orchestrator's view of the local record store.

use std::future::Future;

use crate::error::Result;
use crate::models::{
    FailureOutcome, OutboxEntry, OutboxEntryId, RemoteTask, SyncOperation, SyncStatus, Task,
    TaskId, TaskSnapshot, Winner,
};

/// A last-write-wins decision taken against a `resolved_payload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictDecision {
    /// Local `updated_at` the remote version was compared with
    pub local_updated_at: i64,
    pub remote: RemoteTask,
    pub winner: Winner,
}

/// Everything needed to commit one confirmed outbox entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// Identifier assigned by the remote authority, if any
    pub server_id: Option<String>,
    /// Present when the remote returned its own version of the task
    pub decision: Option<ConflictDecision>,
    /// Confirmation time (Unix ms)
    pub synced_at: i64,
}

/// Durable storage used by [`SyncEngine`](super::SyncEngine).
///
/// Every method is one atomic unit: either all of its writes land or none do.
pub trait SyncStore: Send + Sync {
    /// Queue a mutation for the next cycle.
    fn enqueue(
        &self,
        task_id: &TaskId,
        operation: SyncOperation,
        snapshot: &TaskSnapshot,
    ) -> impl Future<Output = Result<OutboxEntryId>> + Send;

    /// Ordered snapshot of the entries still inside their retry budget.
    fn drain_eligible(
        &self,
        max_retries: u32,
    ) -> impl Future<Output = Result<Vec<OutboxEntry>>> + Send;

    /// Current local version of a task, tombstones included.
    fn local_task(&self, task_id: &TaskId) -> impl Future<Output = Result<Option<Task>>> + Send;

    /// Remove a confirmed entry and bring its task up to date.
    ///
    /// Returns the task's resulting sync status: `Synced` once no other entry
    /// for it remains queued, `Pending` otherwise.
    fn confirm(
        &self,
        entry: &OutboxEntry,
        confirmation: Confirmation,
    ) -> impl Future<Output = Result<SyncStatus>> + Send;

    /// Count a failed delivery against the entry's retry budget.
    fn record_failure(
        &self,
        entry: &OutboxEntry,
        message: &str,
        max_retries: u32,
    ) -> impl Future<Output = Result<FailureOutcome>> + Send;

    /// Number of queued entries.
    fn pending_count(&self) -> impl Future<Output = Result<usize>> + Send;

    /// Time of the latest confirmation (Unix ms).
    fn last_synced_at(&self) -> impl Future<Output = Result<Option<i64>>> + Send;
}
