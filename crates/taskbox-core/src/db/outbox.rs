//! Outbox (sync queue) storage
//!
//! The outbox is the durable, ordered log of local mutations that the remote
//! authority has not confirmed yet. Entries are drained oldest first; each one
//! is removed on confirmed success or once its retry budget is spent.

use crate::error::{Error, Result};
use crate::models::{
    FailureOutcome, OutboxEntry, OutboxEntryId, SyncOperation, SyncStatus, TaskId, TaskSnapshot,
};
use crate::util::{compact_text, now_millis};
use libsql::{params, Connection, Row};

const LAST_SYNCED_AT_KEY: &str = "last_synced_at";

/// libSQL-backed outbox operating on a connection or an open transaction
pub struct LibSqlOutbox<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlOutbox<'a> {
    /// Create an outbox view over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Queue a mutation. Never rejects repeated intents for the same task.
    pub async fn enqueue(
        &self,
        task_id: &TaskId,
        operation: SyncOperation,
        snapshot: &TaskSnapshot,
    ) -> Result<OutboxEntryId> {
        let id = OutboxEntryId::new();
        let data = serde_json::to_string(snapshot)?;

        self.conn
            .execute(
                "INSERT INTO sync_queue (id, task_id, operation, data, enqueued_at, retry_count)
                 VALUES (?, ?, ?, ?, ?, 0)",
                params![
                    id.as_str(),
                    task_id.as_str(),
                    operation.as_str(),
                    data,
                    now_millis()
                ],
            )
            .await?;

        tracing::debug!(entry = %id, task = %task_id, %operation, "Queued change for sync");
        Ok(id)
    }

    /// Snapshot of every entry still inside its retry budget, oldest first
    pub async fn drain_eligible(&self, max_retries: u32) -> Result<Vec<OutboxEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, task_id, operation, data, enqueued_at, retry_count, last_error
                 FROM sync_queue
                 WHERE retry_count < ?
                 ORDER BY enqueued_at ASC, seq ASC",
                params![i64::from(max_retries)],
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_entry(&row)?);
        }
        Ok(entries)
    }

    /// Look up a single entry
    pub async fn get(&self, entry_id: &OutboxEntryId) -> Result<Option<OutboxEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, task_id, operation, data, enqueued_at, retry_count, last_error
                 FROM sync_queue WHERE id = ?",
                params![entry_id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_entry(&row)?)),
            None => Ok(None),
        }
    }

    /// Remove a confirmed entry
    pub async fn record_success(&self, entry_id: &OutboxEntryId) -> Result<()> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM sync_queue WHERE id = ?",
                params![entry_id.as_str()],
            )
            .await?;

        if removed == 0 {
            return Err(Error::NotFound(format!("outbox entry {entry_id}")));
        }
        Ok(())
    }

    /// Count a failed delivery. Reaching `max_retries` evicts the entry and
    /// forces the owning task's status to `error`.
    pub async fn record_failure(
        &self,
        entry_id: &OutboxEntryId,
        error_message: &str,
        max_retries: u32,
    ) -> Result<FailureOutcome> {
        let entry = self
            .get(entry_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("outbox entry {entry_id}")))?;

        let retry_count = entry.retry_count.saturating_add(1);

        if retry_count >= max_retries {
            self.conn
                .execute(
                    "DELETE FROM sync_queue WHERE id = ?",
                    params![entry_id.as_str()],
                )
                .await?;
            self.conn
                .execute(
                    "UPDATE tasks SET sync_status = ? WHERE id = ?",
                    params![SyncStatus::Error.as_str(), entry.task_id.as_str()],
                )
                .await?;
            return Ok(FailureOutcome::Permanent { retry_count });
        }

        self.conn
            .execute(
                "UPDATE sync_queue SET retry_count = ?, last_error = ? WHERE id = ?",
                params![
                    i64::from(retry_count),
                    compact_text(error_message),
                    entry_id.as_str()
                ],
            )
            .await?;
        Ok(FailureOutcome::Retrying { retry_count })
    }

    /// Number of queued entries
    pub async fn pending_count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM sync_queue", ())
            .await?;

        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|_| Error::Database("negative outbox count".to_string()))
    }

    /// Number of queued entries that still reference a task
    pub async fn remaining_for_task(&self, task_id: &TaskId) -> Result<usize> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM sync_queue WHERE task_id = ?",
                params![task_id.as_str()],
            )
            .await?;

        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        usize::try_from(count).map_err(|_| Error::Database("negative outbox count".to_string()))
    }

    /// When the remote authority last confirmed any entry (Unix ms)
    pub async fn last_synced_at(&self) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT value FROM sync_meta WHERE key = ?",
                [LAST_SYNCED_AT_KEY],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let value: String = row.get(0)?;
        value
            .parse::<i64>()
            .map(Some)
            .map_err(|_| Error::Database(format!("invalid {LAST_SYNCED_AT_KEY} value: {value}")))
    }

    /// Stamp the moment of the latest confirmation
    pub async fn stamp_synced(&self, synced_at: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?, ?)",
                params![LAST_SYNCED_AT_KEY, synced_at.to_string()],
            )
            .await?;
        Ok(())
    }

    fn parse_entry(row: &Row) -> Result<OutboxEntry> {
        let id: String = row.get(0)?;
        let task_id: String = row.get(1)?;
        let operation: String = row.get(2)?;
        let data: String = row.get(3)?;
        let retry_count: i64 = row.get(5)?;

        Ok(OutboxEntry {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid outbox entry id: {id}")))?,
            task_id: task_id
                .parse()
                .map_err(|_| Error::Database(format!("invalid task id in outbox: {task_id}")))?,
            operation: operation.parse()?,
            snapshot: serde_json::from_str(&data)?,
            enqueued_at: row.get(4)?,
            retry_count: u32::try_from(retry_count).unwrap_or(u32::MAX),
            last_error: row.get::<Option<String>>(6)?,
        })
    }
}
