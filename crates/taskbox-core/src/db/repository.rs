//! Task repository implementation

use crate::error::{Error, Result};
use crate::models::{
    NewTask, RemoteTask, SyncConflict, SyncOperation, SyncStatus, Task, TaskId, TaskUpdate,
    Winner,
};
use crate::util::now_millis;
use libsql::{params, Connection, Row};

use super::outbox::LibSqlOutbox;

const TASK_COLUMNS: &str = "id, server_id, title, description, completed, created_at, updated_at, is_deleted, sync_status, last_synced_at";

/// Trait for task storage operations (async)
///
/// Every mutation writes the task and queues exactly one outbox entry in the
/// same transaction.
#[allow(async_fn_in_trait)]
pub trait TaskRepository {
    /// Create a new task
    async fn create(&self, input: &NewTask) -> Result<Task>;

    /// Get a task by ID (tombstones excluded)
    async fn get(&self, id: &TaskId) -> Result<Option<Task>>;

    /// List tasks (tombstones excluded), most recently updated first
    async fn list(&self) -> Result<Vec<Task>>;

    /// Apply a partial update
    async fn update(&self, id: &TaskId, update: TaskUpdate) -> Result<Task>;

    /// Soft delete a task.
    ///
    /// A tombstone whose deletion exhausted its retries (`error`) is queued
    /// again; any other tombstone is `NotFound`.
    async fn delete(&self, id: &TaskId) -> Result<()>;

    /// Tasks whose latest change is pending or failed, tombstones included
    async fn list_needing_sync(&self) -> Result<Vec<Task>>;
}

/// libSQL implementation of `TaskRepository`
pub struct LibSqlTaskRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlTaskRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Get a task by ID, tombstones included
    pub async fn get_any(&self, id: &TaskId) -> Result<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?");
        let mut rows = self.conn.query(&sql, params![id.as_str()]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_task(&row)?)),
            None => Ok(None),
        }
    }

    /// Overwrite the user fields with a remote version, unless the local row
    /// has moved past it in the meantime. Returns whether the row changed.
    pub async fn apply_remote(&self, id: &TaskId, remote: &RemoteTask) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE tasks
                 SET title = ?, description = ?, completed = ?, is_deleted = ?, updated_at = ?
                 WHERE id = ? AND updated_at <= ?",
                params![
                    remote.title.clone(),
                    remote.description.clone(),
                    i32::from(remote.completed),
                    i32::from(remote.is_deleted),
                    remote.updated_at,
                    id.as_str(),
                    remote.updated_at
                ],
            )
            .await?;
        Ok(rows > 0)
    }

    /// Record a confirmation from the remote authority
    ///
    /// Adopts `server_id` when one is given and stamps `last_synced_at`;
    /// `status` is `synced` only once no other change for the task is queued.
    pub async fn confirm_sync(
        &self,
        id: &TaskId,
        server_id: Option<&str>,
        status: SyncStatus,
        synced_at: i64,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE tasks
                 SET sync_status = ?, last_synced_at = ?, server_id = COALESCE(?, server_id)
                 WHERE id = ?",
                params![
                    status.as_str(),
                    synced_at,
                    server_id.map(ToString::to_string),
                    id.as_str()
                ],
            )
            .await?;
        Ok(())
    }

    /// Drop a tombstone whose deletion has synced
    pub async fn purge_tombstone(&self, id: &TaskId) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "DELETE FROM tasks WHERE id = ? AND is_deleted = 1",
                params![id.as_str()],
            )
            .await?;
        Ok(rows > 0)
    }

    /// Log a last-write-wins decision
    pub async fn log_conflict(
        &self,
        id: &TaskId,
        local_updated_at: i64,
        remote_updated_at: i64,
        winner: Winner,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sync_conflicts
                 (task_id, local_updated_at, remote_updated_at, winner, resolved_at, strategy)
                 VALUES (?, ?, ?, ?, ?, 'lww')",
                params![
                    id.as_str(),
                    local_updated_at,
                    remote_updated_at,
                    winner.as_str(),
                    now_millis()
                ],
            )
            .await?;
        Ok(())
    }

    /// Most recent conflict decisions, newest first
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<SyncConflict>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = self
            .conn
            .query(
                "SELECT id, task_id, local_updated_at, remote_updated_at, winner, resolved_at, strategy
                 FROM sync_conflicts
                 ORDER BY resolved_at DESC, id DESC
                 LIMIT ?",
                params![limit],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            let winner: String = row.get(4)?;
            conflicts.push(SyncConflict {
                id: row.get(0)?,
                task_id: row.get(1)?,
                local_updated_at: row.get(2)?,
                remote_updated_at: row.get(3)?,
                winner: winner
                    .parse::<Winner>()
                    .map_err(|_| Error::Database(format!("invalid conflict winner: {winner}")))?,
                resolved_at: row.get(5)?,
                strategy: row.get(6)?,
            });
        }
        Ok(conflicts)
    }

    async fn query_tasks(&self, sql: &str) -> Result<Vec<Task>> {
        let mut rows = self.conn.query(sql, ()).await?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(Self::parse_task(&row)?);
        }
        Ok(tasks)
    }

    async fn write_task(&self, task: &Task) -> Result<u64> {
        let rows = self
            .conn
            .execute(
                "UPDATE tasks
                 SET title = ?, description = ?, completed = ?, updated_at = ?, is_deleted = ?, sync_status = ?
                 WHERE id = ?",
                params![
                    task.title.clone(),
                    task.description.clone(),
                    i32::from(task.completed),
                    task.updated_at,
                    i32::from(task.is_deleted),
                    task.sync_status.as_str(),
                    task.id.as_str()
                ],
            )
            .await?;
        Ok(rows)
    }

    /// Load a live task or fail with `NotFound`
    async fn require_live(&self, id: &TaskId) -> Result<Task> {
        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {id}")))
    }

    /// Load a live task, or a tombstone stuck in `error`, or fail with `NotFound`
    async fn require_deletable(&self, id: &TaskId) -> Result<Task> {
        self.get_any(id)
            .await?
            .filter(|task| !task.is_deleted || task.sync_status == SyncStatus::Error)
            .ok_or_else(|| Error::NotFound(format!("task {id}")))
    }

    /// Parse a task from a database row
    fn parse_task(row: &Row) -> Result<Task> {
        let id: String = row.get(0)?;
        let sync_status: String = row.get(8)?;
        Ok(Task {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid task id: {id}")))?,
            server_id: row.get::<Option<String>>(1)?,
            title: row.get(2)?,
            description: row.get::<Option<String>>(3)?,
            completed: row.get::<i32>(4)? != 0,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            is_deleted: row.get::<i32>(7)? != 0,
            sync_status: sync_status.parse()?,
            last_synced_at: row.get::<Option<i64>>(9)?,
        })
    }
}

impl TaskRepository for LibSqlTaskRepository<'_> {
    async fn create(&self, input: &NewTask) -> Result<Task> {
        let task = Task::new(input.clone())?;

        let tx = self.conn.transaction().await?;
        tx.execute(
            "INSERT INTO tasks
             (id, server_id, title, description, completed, created_at, updated_at, is_deleted, sync_status, last_synced_at)
             VALUES (?, NULL, ?, ?, ?, ?, ?, 0, ?, NULL)",
            params![
                task.id.as_str(),
                task.title.clone(),
                task.description.clone(),
                i32::from(task.completed),
                task.created_at,
                task.updated_at,
                task.sync_status.as_str()
            ],
        )
        .await?;
        LibSqlOutbox::new(&tx)
            .enqueue(&task.id, SyncOperation::Create, &task.snapshot())
            .await?;
        tx.commit().await?;

        Ok(task)
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        Ok(self.get_any(id).await?.filter(|task| !task.is_deleted))
    }

    async fn list(&self) -> Result<Vec<Task>> {
        self.query_tasks(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE is_deleted = 0 ORDER BY updated_at DESC"
        ))
        .await
    }

    async fn update(&self, id: &TaskId, update: TaskUpdate) -> Result<Task> {
        let tx = self.conn.transaction().await?;
        let repo = LibSqlTaskRepository::new(&tx);

        let mut task = repo.require_live(id).await?;
        task.apply_update(update)?;
        repo.write_task(&task).await?;
        LibSqlOutbox::new(&tx)
            .enqueue(&task.id, SyncOperation::Update, &task.snapshot())
            .await?;
        tx.commit().await?;

        Ok(task)
    }

    async fn delete(&self, id: &TaskId) -> Result<()> {
        let tx = self.conn.transaction().await?;
        let repo = LibSqlTaskRepository::new(&tx);

        let mut task = repo.require_deletable(id).await?;
        task.mark_deleted();
        repo.write_task(&task).await?;
        LibSqlOutbox::new(&tx)
            .enqueue(&task.id, SyncOperation::Delete, &task.snapshot())
            .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn list_needing_sync(&self) -> Result<Vec<Task>> {
        self.query_tasks(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE sync_status IN ('pending', 'error')
             ORDER BY updated_at ASC"
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    async fn queued(db: &Database) -> Vec<crate::models::OutboxEntry> {
        LibSqlOutbox::new(db.connection())
            .drain_eligible(u32::MAX)
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_and_get() {
        let db = setup().await;
        let repo = LibSqlTaskRepository::new(db.connection());

        let task = repo
            .create(&NewTask::new("Buy milk").with_description("oat"))
            .await
            .unwrap();
        assert_eq!(task.sync_status, SyncStatus::Pending);

        let fetched = repo.get(&task.id).await.unwrap().unwrap();
        assert_eq!(fetched, task);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_rejects_empty_title_without_queueing() {
        let db = setup().await;
        let repo = LibSqlTaskRepository::new(db.connection());

        assert!(repo.create(&NewTask::new("  ")).await.is_err());
        assert!(queued(&db).await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_each_mutation_queues_one_entry_in_order() {
        let db = setup().await;
        let repo = LibSqlTaskRepository::new(db.connection());

        let task = repo.create(&NewTask::new("Draft")).await.unwrap();
        repo.update(
            &task.id,
            TaskUpdate {
                title: Some("Final".to_string()),
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();
        repo.update(
            &task.id,
            TaskUpdate {
                completed: Some(true),
                ..TaskUpdate::default()
            },
        )
        .await
        .unwrap();
        repo.delete(&task.id).await.unwrap();

        let entries = queued(&db).await;
        let operations: Vec<_> = entries.iter().map(|entry| entry.operation).collect();
        assert_eq!(
            operations,
            vec![
                SyncOperation::Create,
                SyncOperation::Update,
                SyncOperation::Update,
                SyncOperation::Delete,
            ]
        );
        assert!(entries.iter().all(|entry| entry.task_id == task.id));
        assert_eq!(entries[0].snapshot.title, "Draft");
        assert_eq!(entries[1].snapshot.title, "Final");
        assert!(!entries[1].snapshot.completed);
        assert!(entries[2].snapshot.completed);
        assert!(entries[3].snapshot.is_deleted);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_excludes_tombstones() {
        let db = setup().await;
        let repo = LibSqlTaskRepository::new(db.connection());

        let keep = repo.create(&NewTask::new("Keep")).await.unwrap();
        let gone = repo.create(&NewTask::new("Gone")).await.unwrap();
        repo.delete(&gone.id).await.unwrap();

        let tasks = repo.list().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, keep.id);

        assert!(repo.get(&gone.id).await.unwrap().is_none());
        let tombstone = repo.get_any(&gone.id).await.unwrap().unwrap();
        assert!(tombstone.is_deleted);
        assert_eq!(tombstone.sync_status, SyncStatus::Pending);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_and_delete_missing_task() {
        let db = setup().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        let missing = TaskId::new();

        let err = repo
            .update(&missing, TaskUpdate::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(repo.delete(&missing).await.unwrap_err().is_not_found());

        let task = repo.create(&NewTask::new("Once")).await.unwrap();
        repo.delete(&task.id).await.unwrap();
        assert!(repo.delete(&task.id).await.unwrap_err().is_not_found());
        assert_eq!(queued(&db).await.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_tombstone_can_be_deleted_again() {
        let db = setup().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        let outbox = LibSqlOutbox::new(db.connection());

        let task = repo.create(&NewTask::new("Stubborn")).await.unwrap();
        let create = outbox.drain_eligible(3).await.unwrap().remove(0);
        outbox.record_success(&create.id).await.unwrap();
        repo.delete(&task.id).await.unwrap();

        let delete = outbox.drain_eligible(3).await.unwrap().remove(0);
        for _ in 0..3 {
            outbox.record_failure(&delete.id, "timeout", 3).await.unwrap();
        }
        let stuck = repo.get_any(&task.id).await.unwrap().unwrap();
        assert!(stuck.is_deleted);
        assert_eq!(stuck.sync_status, SyncStatus::Error);
        assert_eq!(outbox.pending_count().await.unwrap(), 0);
        assert!(repo
            .update(&task.id, TaskUpdate::default())
            .await
            .unwrap_err()
            .is_not_found());

        repo.delete(&task.id).await.unwrap();

        let requeued = repo.get_any(&task.id).await.unwrap().unwrap();
        assert!(requeued.is_deleted);
        assert_eq!(requeued.sync_status, SyncStatus::Pending);
        assert!(requeued.updated_at >= stuck.updated_at);

        let entries = queued(&db).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, SyncOperation::Delete);
        assert_eq!(entries[0].retry_count, 0);
        assert!(entries[0].snapshot.is_deleted);

        // A pending tombstone still refuses another delete.
        assert!(repo.delete(&task.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_needing_sync_includes_tombstones_and_errors() {
        let db = setup().await;
        let repo = LibSqlTaskRepository::new(db.connection());

        let synced = repo.create(&NewTask::new("Synced")).await.unwrap();
        repo.confirm_sync(&synced.id, Some("srv-1"), SyncStatus::Synced, now_millis())
            .await
            .unwrap();
        let failed = repo.create(&NewTask::new("Failed")).await.unwrap();
        repo.confirm_sync(&failed.id, None, SyncStatus::Error, now_millis())
            .await
            .unwrap();
        let deleted = repo.create(&NewTask::new("Deleted")).await.unwrap();
        repo.delete(&deleted.id).await.unwrap();

        let ids: Vec<_> = repo
            .list_needing_sync()
            .await
            .unwrap()
            .into_iter()
            .map(|task| task.id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&failed.id));
        assert!(ids.contains(&deleted.id));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_apply_remote_refuses_older_versions() {
        let db = setup().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        let task = repo.create(&NewTask::new("Local")).await.unwrap();

        let older = RemoteTask {
            title: "Stale".to_string(),
            description: None,
            completed: true,
            is_deleted: false,
            updated_at: task.updated_at - 1,
            server_id: None,
        };
        assert!(!repo.apply_remote(&task.id, &older).await.unwrap());

        let newer = RemoteTask {
            title: "Fresh".to_string(),
            updated_at: task.updated_at + 1,
            ..older
        };
        assert!(repo.apply_remote(&task.id, &newer).await.unwrap());

        let stored = repo.get(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Fresh");
        assert!(stored.completed);
        assert_eq!(stored.updated_at, task.updated_at + 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_confirm_sync_keeps_existing_server_id() {
        let db = setup().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        let task = repo.create(&NewTask::new("Remote")).await.unwrap();

        repo.confirm_sync(&task.id, Some("srv-42"), SyncStatus::Synced, 10)
            .await
            .unwrap();
        repo.confirm_sync(&task.id, None, SyncStatus::Synced, 20)
            .await
            .unwrap();

        let stored = repo.get(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.server_id.as_deref(), Some("srv-42"));
        assert_eq!(stored.last_synced_at, Some(20));
        assert_eq!(stored.sync_status, SyncStatus::Synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_conflict_log() {
        let db = setup().await;
        let repo = LibSqlTaskRepository::new(db.connection());
        let id = TaskId::new();

        repo.log_conflict(&id, 200, 100, Winner::Local).await.unwrap();
        let conflicts = repo.list_conflicts(10).await.unwrap();

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].task_id, id.to_string());
        assert_eq!(conflicts[0].winner, Winner::Local);
        assert_eq!(conflicts[0].strategy, "lww");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_conflict_log_rejects_unknown_winner() {
        let db = setup().await;
        db.connection()
            .execute(
                "INSERT INTO sync_conflicts
                 (task_id, local_updated_at, remote_updated_at, winner, resolved_at, strategy)
                 VALUES ('t-1', 1, 2, 'both', 3, 'lww')",
                (),
            )
            .await
            .unwrap();

        let repo = LibSqlTaskRepository::new(db.connection());
        let err = repo.list_conflicts(10).await.unwrap_err();
        assert!(matches!(err, Error::Database(message) if message.contains("both")));
    }
}
