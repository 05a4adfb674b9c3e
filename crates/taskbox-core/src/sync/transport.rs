//! Batch transport: ships a slice of outbox entries to the remote authority
//! in one exchange and lines the answers up with the request.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::TransportError;
use crate::config::SyncConfig;
use crate::models::{OutboxEntry, OutboxEntryId, RemoteTask, SyncOperation, TaskId, TaskSnapshot};
use crate::util::compact_text;

/// Per-item verdict of the remote authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Success,
    /// Any status other than `success`
    #[serde(other)]
    Failure,
}

/// Outcome for one entry, positionally aligned with the request batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    pub entry_id: OutboxEntryId,
    pub status: ItemStatus,
    pub server_id: Option<String>,
    /// The remote authority's own version of the task, if it returned one
    pub resolved_payload: Option<RemoteTask>,
    pub error: Option<String>,
}

impl ItemResult {
    pub const fn success(entry_id: OutboxEntryId) -> Self {
        Self {
            entry_id,
            status: ItemStatus::Success,
            server_id: None,
            resolved_payload: None,
            error: None,
        }
    }

    pub fn failure(entry_id: OutboxEntryId, error: impl Into<String>) -> Self {
        Self {
            entry_id,
            status: ItemStatus::Failure,
            server_id: None,
            resolved_payload: None,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    #[must_use]
    pub fn with_resolved_payload(mut self, remote: RemoteTask) -> Self {
        self.resolved_payload = Some(remote);
        self
    }
}

/// Exchanges one ordered batch with the remote authority.
///
/// Implementations return exactly one result per entry, in request order,
/// or an error that applies to the whole batch.
pub trait BatchTransport: Send + Sync {
    fn exchange(
        &self,
        batch: &[OutboxEntry],
    ) -> impl Future<Output = Result<Vec<ItemResult>, TransportError>> + Send;
}

/// Check that `results` answers `batch` position by position.
pub fn check_alignment(batch: &[OutboxEntry], results: &[ItemResult]) -> Result<(), TransportError> {
    if results.len() != batch.len() {
        return Err(TransportError::Protocol(format!(
            "expected {} results, received {}",
            batch.len(),
            results.len()
        )));
    }
    for (index, (entry, result)) in batch.iter().zip(results).enumerate() {
        if entry.id != result.entry_id {
            return Err(TransportError::Protocol(format!(
                "result {index} answers {} instead of {}",
                result.entry_id, entry.id
            )));
        }
    }
    Ok(())
}

/// `POST /sync/batch` request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub items: Vec<BatchItem>,
    pub client_timestamp: DateTime<Utc>,
}

impl BatchRequest {
    pub fn from_entries(batch: &[OutboxEntry]) -> Self {
        Self {
            items: batch.iter().map(BatchItem::from).collect(),
            client_timestamp: Utc::now(),
        }
    }
}

/// One outbox entry on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: OutboxEntryId,
    pub task_id: TaskId,
    pub operation: SyncOperation,
    pub data: TaskSnapshot,
    pub created_at: i64,
    pub retry_count: u32,
}

impl From<&OutboxEntry> for BatchItem {
    fn from(entry: &OutboxEntry) -> Self {
        Self {
            id: entry.id,
            task_id: entry.task_id,
            operation: entry.operation,
            data: entry.snapshot.clone(),
            created_at: entry.enqueued_at,
            retry_count: entry.retry_count,
        }
    }
}

/// `POST /sync/batch` response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub processed_items: Vec<ProcessedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedItem {
    #[serde(default, alias = "client_id", skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    pub status: ItemStatus,
    #[serde(default, alias = "resolved_data", skip_serializing_if = "Option::is_none")]
    pub resolved_payload: Option<RemoteTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Line wire items up with the request; an item that names an entry must
/// name the one at its own position.
fn align(batch: &[OutboxEntry], items: Vec<ProcessedItem>) -> Result<Vec<ItemResult>, TransportError> {
    if items.len() != batch.len() {
        return Err(TransportError::Protocol(format!(
            "expected {} processed items, received {}",
            batch.len(),
            items.len()
        )));
    }

    batch
        .iter()
        .zip(items)
        .enumerate()
        .map(|(index, (entry, item))| {
            if let Some(named) = item.entry_id.as_deref() {
                if named != entry.id.as_str() {
                    return Err(TransportError::Protocol(format!(
                        "processed item {index} answers {named} instead of {}",
                        entry.id
                    )));
                }
            }
            Ok(ItemResult {
                entry_id: entry.id,
                status: item.status,
                server_id: item.server_id,
                resolved_payload: item.resolved_payload,
                error: item.error,
            })
        })
        .collect()
}

/// HTTP transport against `{remote_base_url}/sync/batch`
#[derive(Clone)]
pub struct HttpBatchTransport {
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpBatchTransport {
    pub fn new(config: &SyncConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.exchange_timeout)
            .build()
            .map_err(|error| TransportError::Connection(error.to_string()))?;
        Ok(Self {
            endpoint: config.endpoint("sync/batch"),
            client,
            timeout: config.exchange_timeout,
        })
    }

    async fn send(&self, batch: &[OutboxEntry]) -> Result<Vec<ItemResult>, TransportError> {
        let request = BatchRequest::from_entries(batch);
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: compact_text(&body),
            });
        }

        let body = response.text().await?;
        let parsed: BatchResponse = serde_json::from_str(&body)
            .map_err(|error| TransportError::Decode(error.to_string()))?;
        align(batch, parsed.processed_items)
    }
}

impl BatchTransport for HttpBatchTransport {
    async fn exchange(&self, batch: &[OutboxEntry]) -> Result<Vec<ItemResult>, TransportError> {
        tracing::debug!(items = batch.len(), endpoint = %self.endpoint, "Exchanging sync batch");
        tokio::time::timeout(self.timeout, self.send(batch))
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}
