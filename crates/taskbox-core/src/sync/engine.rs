//! Sync orchestrator.
//!
//! One cycle walks `Idle -> Probing -> Draining -> Batching -> Exchanging ->
//! Reconciling -> Idle`. Every exit, including failures, returns a
//! [`SyncReport`]; nothing a cycle encounters is raised to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Semaphore};

use super::error::TransportError;
use super::probe::ConnectivityProbe;
use super::resolver::resolve;
use super::store::{Confirmation, ConflictDecision, SyncStore};
use super::transport::{check_alignment, BatchTransport, ItemResult, ItemStatus};
use crate::config::{ConfigError, SyncConfig};
use crate::error::Result;
use crate::models::{
    CycleOutcome, OutboxEntry, OutboxEntryId, SyncErrorEntry, SyncOperation, SyncReport, TaskId,
    TaskSnapshot,
};
use crate::util::now_millis;

/// Where the engine currently is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Probing,
    Draining,
    Batching,
    Exchanging,
    Reconciling,
}

/// Read-only view of the sync state, reflecting committed data only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusSnapshot {
    pub pending_items: usize,
    pub last_sync: Option<DateTime<Utc>>,
    pub server_reachable: bool,
    pub phase: SyncPhase,
}

/// Resets the published phase when a cycle ends, however it ends.
struct PhaseReset<'a>(&'a watch::Sender<SyncPhase>);

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        self.0.send_replace(SyncPhase::Idle);
    }
}

/// Drives outbox entries to the remote authority, one cycle at a time.
pub struct SyncEngine<S, T, P> {
    config: SyncConfig,
    store: S,
    transport: T,
    probe: P,
    cycle_guard: Semaphore,
    phase: watch::Sender<SyncPhase>,
}

impl<S, T, P> SyncEngine<S, T, P>
where
    S: SyncStore,
    T: BatchTransport,
    P: ConnectivityProbe,
{
    /// Build an engine; the only fallible step is rejecting an invalid config.
    pub fn new(config: SyncConfig, store: S, transport: T, probe: P) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Ok(Self {
            config,
            store,
            transport,
            probe,
            cycle_guard: Semaphore::new(1),
            phase,
        })
    }

    /// Current phase.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Queue a mutation for the next cycle.
    pub async fn enqueue(
        &self,
        task_id: &TaskId,
        operation: SyncOperation,
        snapshot: &TaskSnapshot,
    ) -> Result<OutboxEntryId> {
        self.store.enqueue(task_id, operation, snapshot).await
    }

    pub async fn pending_count(&self) -> Result<usize> {
        self.store.pending_count().await
    }

    pub async fn last_synced_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .last_synced_at()
            .await?
            .and_then(DateTime::from_timestamp_millis))
    }

    pub async fn is_reachable(&self) -> bool {
        self.probe.is_reachable().await
    }

    /// Outbox size, last confirmation, reachability and phase in one read.
    pub async fn status(&self) -> Result<SyncStatusSnapshot> {
        let pending_items = self.pending_count().await?;
        let last_sync = self.last_synced_at().await?;
        Ok(SyncStatusSnapshot {
            pending_items,
            last_sync,
            server_reachable: self.is_reachable().await,
            phase: self.phase(),
        })
    }

    /// Run one sync cycle.
    ///
    /// Returns immediately with `AlreadyRunning` when another cycle holds the
    /// guard.
    pub async fn run_cycle(&self) -> SyncReport {
        let Ok(_permit) = self.cycle_guard.try_acquire() else {
            tracing::debug!("Sync cycle already in flight, skipping");
            return SyncReport::skipped(CycleOutcome::AlreadyRunning).finish();
        };
        let _reset = PhaseReset(&self.phase);

        self.set_phase(SyncPhase::Probing);
        if !self.probe.is_reachable().await {
            tracing::info!("Remote authority unreachable, skipping sync cycle");
            return SyncReport::skipped(CycleOutcome::Unreachable).finish();
        }

        let mut report = SyncReport::start();

        self.set_phase(SyncPhase::Draining);
        let entries = match self.store.drain_eligible(self.config.max_retries).await {
            Ok(entries) => entries,
            Err(error) => {
                tracing::error!(%error, "Failed to read the outbox");
                report.abort(format!("Failed to read the outbox: {error}"));
                return report.finish();
            }
        };
        if entries.is_empty() {
            tracing::debug!("Outbox is empty, nothing to sync");
            return report.finish();
        }

        tracing::info!(
            entries = entries.len(),
            batch_size = self.config.batch_size,
            "Starting sync cycle"
        );

        self.set_phase(SyncPhase::Batching);
        let batches: Vec<&[OutboxEntry]> = entries.chunks(self.config.batch_size).collect();

        for (index, batch) in batches.into_iter().enumerate() {
            self.set_phase(SyncPhase::Exchanging);
            let results = self.exchange(batch).await;

            self.set_phase(SyncPhase::Reconciling);
            if let Err(error) = self.reconcile_batch(batch, results, &mut report).await {
                tracing::error!(%error, batch = index, "Sync cycle aborted by a local store failure");
                report.abort(format!("Local store failure: {error}"));
                return report.finish();
            }
        }

        tracing::info!(
            succeeded = report.succeeded_count,
            failed = report.failed_count,
            "Sync cycle finished"
        );
        report.finish()
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.phase.send_replace(phase);
    }

    async fn exchange(&self, batch: &[OutboxEntry]) -> std::result::Result<Vec<ItemResult>, TransportError> {
        tracing::debug!(items = batch.len(), "Sending sync batch");
        let results = self.transport.exchange(batch).await?;
        check_alignment(batch, &results)?;
        Ok(results)
    }

    /// Apply one batch's outcome in request order. A store error stops the
    /// batch where it happened and leaves the rest of the outbox untouched.
    async fn reconcile_batch(
        &self,
        batch: &[OutboxEntry],
        results: std::result::Result<Vec<ItemResult>, TransportError>,
        report: &mut SyncReport,
    ) -> Result<()> {
        match results {
            Ok(results) => {
                for (entry, result) in batch.iter().zip(results) {
                    match result.status {
                        ItemStatus::Success => {
                            self.reconcile_success(entry, result).await?;
                            report.record_success();
                        }
                        ItemStatus::Failure => {
                            let message = result
                                .error
                                .unwrap_or_else(|| "remote rejected the change".to_string());
                            self.reconcile_failure(entry, &message, report).await?;
                        }
                    }
                }
            }
            Err(error) => {
                tracing::warn!(%error, items = batch.len(), "Sync batch failed");
                let message = error.to_string();
                for entry in batch {
                    self.reconcile_failure(entry, &message, report).await?;
                }
            }
        }
        Ok(())
    }

    async fn reconcile_success(&self, entry: &OutboxEntry, result: ItemResult) -> Result<()> {
        let decision = match result.resolved_payload {
            Some(remote) => self
                .store
                .local_task(&entry.task_id)
                .await?
                .map(|local| {
                    let winner = resolve(&local, &remote);
                    tracing::info!(
                        task = %entry.task_id,
                        local_updated_at = local.updated_at,
                        remote_updated_at = remote.updated_at,
                        winner = winner.as_str(),
                        "Resolved sync conflict"
                    );
                    ConflictDecision {
                        local_updated_at: local.updated_at,
                        remote,
                        winner,
                    }
                }),
            None => None,
        };

        let server_id = result.server_id.or_else(|| {
            decision
                .as_ref()
                .and_then(|decision| decision.remote.server_id.clone())
        });

        let status = self
            .store
            .confirm(
                entry,
                Confirmation {
                    server_id,
                    decision,
                    synced_at: now_millis(),
                },
            )
            .await?;
        tracing::debug!(entry = %entry.id, task = %entry.task_id, %status, "Outbox entry confirmed");
        Ok(())
    }

    async fn reconcile_failure(
        &self,
        entry: &OutboxEntry,
        message: &str,
        report: &mut SyncReport,
    ) -> Result<()> {
        let outcome = self
            .store
            .record_failure(entry, message, self.config.max_retries)
            .await?;

        if outcome.is_permanent() {
            tracing::warn!(
                entry = %entry.id,
                task = %entry.task_id,
                operation = %entry.operation,
                error = message,
                "Retry budget exhausted, change marked as failed"
            );
        } else {
            tracing::warn!(
                entry = %entry.id,
                task = %entry.task_id,
                error = message,
                "Sync item failed, will retry"
            );
        }

        report.record_failure(SyncErrorEntry::for_entry(
            entry,
            message,
            outcome.is_permanent(),
        ));
        Ok(())
    }
}
