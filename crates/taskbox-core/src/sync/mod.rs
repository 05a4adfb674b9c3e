//! Offline sync engine.
//!
//! Local mutations land in the outbox; [`SyncEngine::run_cycle`] drains it in
//! order, ships fixed-size batches to the remote authority and reconciles each
//! answer against the local store, resolving conflicts by last-write-wins.

mod engine;
mod error;
mod probe;
mod resolver;
mod store;
mod transport;

pub use engine::{SyncEngine, SyncPhase, SyncStatusSnapshot};
pub use error::TransportError;
pub use probe::{ConnectivityProbe, HttpProbe};
pub use resolver::{resolve, Versioned};
pub use store::{Confirmation, ConflictDecision, SyncStore};
pub use transport::{
    check_alignment, BatchItem, BatchRequest, BatchResponse, BatchTransport, HttpBatchTransport,
    ItemResult, ItemStatus, ProcessedItem,
};
