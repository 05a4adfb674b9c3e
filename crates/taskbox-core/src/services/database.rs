//! Shared database service wrapper used across clients.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{Database, LibSqlOutbox, LibSqlTaskRepository, TaskRepository};
use crate::models::{
    FailureOutcome, NewTask, OutboxEntry, OutboxEntryId, SyncConflict, SyncOperation, SyncStatus,
    Task, TaskSnapshot, TaskUpdate, Winner,
};
use crate::sync::{Confirmation, SyncStore};
use crate::{Result, TaskId};

/// Thread-safe service for DB and repository operations.
///
/// Every multi-row unit runs as one transaction while the lock is held, so a
/// reader never sees a task and its outbox entries half-applied.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        tracing::info!(path = %db_path.display(), "Opened local task store");
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem location, `None` for in-memory stores.
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// List live tasks, most recently updated first.
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.list().await
    }

    /// Fetch a live task by id.
    pub async fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.get(id).await
    }

    /// Create a task and queue its `create` entry.
    pub async fn create_task(&self, input: &NewTask) -> Result<Task> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.create(input).await
    }

    /// Update a task and queue its `update` entry.
    pub async fn update_task(&self, id: &TaskId, update: TaskUpdate) -> Result<Task> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.update(id, update).await
    }

    /// Soft-delete a task and queue its `delete` entry.
    pub async fn delete_task(&self, id: &TaskId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.delete(id).await
    }

    /// Tasks with unconfirmed or failed changes, tombstones included.
    pub async fn list_tasks_needing_sync(&self) -> Result<Vec<Task>> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.list_needing_sync().await
    }

    /// List recently resolved sync conflicts.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let db = self.db.lock().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        repo.list_conflicts(limit).await
    }
}

impl SyncStore for DatabaseService {
    async fn enqueue(
        &self,
        task_id: &TaskId,
        operation: SyncOperation,
        snapshot: &TaskSnapshot,
    ) -> Result<OutboxEntryId> {
        let db = self.db.lock().await;
        LibSqlOutbox::new(db.connection())
            .enqueue(task_id, operation, snapshot)
            .await
    }

    async fn drain_eligible(&self, max_retries: u32) -> Result<Vec<OutboxEntry>> {
        let db = self.db.lock().await;
        LibSqlOutbox::new(db.connection())
            .drain_eligible(max_retries)
            .await
    }

    async fn local_task(&self, task_id: &TaskId) -> Result<Option<Task>> {
        let db = self.db.lock().await;
        LibSqlTaskRepository::new(db.connection())
            .get_any(task_id)
            .await
    }

    async fn confirm(&self, entry: &OutboxEntry, confirmation: Confirmation) -> Result<SyncStatus> {
        let db = self.db.lock().await;
        let tx = db.connection().transaction().await?;
        let repo = LibSqlTaskRepository::new(&tx);
        let outbox = LibSqlOutbox::new(&tx);

        if let Some(decision) = &confirmation.decision {
            repo.log_conflict(
                &entry.task_id,
                decision.local_updated_at,
                decision.remote.updated_at,
                decision.winner,
            )
            .await?;

            if decision.winner == Winner::Remote
                && !repo.apply_remote(&entry.task_id, &decision.remote).await?
            {
                tracing::debug!(task = %entry.task_id, "Local task moved past the remote version, keeping it");
            }
        }

        outbox.record_success(&entry.id).await?;

        let remaining = outbox.remaining_for_task(&entry.task_id).await?;
        let status = if remaining == 0 {
            SyncStatus::Synced
        } else {
            SyncStatus::Pending
        };
        repo.confirm_sync(
            &entry.task_id,
            confirmation.server_id.as_deref(),
            status,
            confirmation.synced_at,
        )
        .await?;
        outbox.stamp_synced(confirmation.synced_at).await?;

        if remaining == 0 && repo.purge_tombstone(&entry.task_id).await? {
            tracing::debug!(task = %entry.task_id, "Purged synced tombstone");
        }

        tx.commit().await?;
        Ok(status)
    }

    async fn record_failure(
        &self,
        entry: &OutboxEntry,
        message: &str,
        max_retries: u32,
    ) -> Result<FailureOutcome> {
        let db = self.db.lock().await;
        let tx = db.connection().transaction().await?;
        let outcome = LibSqlOutbox::new(&tx)
            .record_failure(&entry.id, message, max_retries)
            .await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn pending_count(&self) -> Result<usize> {
        let db = self.db.lock().await;
        LibSqlOutbox::new(db.connection()).pending_count().await
    }

    async fn last_synced_at(&self) -> Result<Option<i64>> {
        let db = self.db.lock().await;
        LibSqlOutbox::new(db.connection()).last_synced_at().await
    }
}
