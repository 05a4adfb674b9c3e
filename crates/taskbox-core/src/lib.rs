//! taskbox-core - Core library for Taskbox
//!
//! This crate contains the task model, the libSQL-backed record store and
//! outbox, and the offline sync engine shared by the API and the CLI.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use config::{ConfigError, SyncConfig};
pub use error::{Error, Result};
pub use models::{
    CycleOutcome, NewTask, OutboxEntry, OutboxEntryId, SyncErrorEntry, SyncOperation, SyncReport,
    SyncStatus, Task, TaskId, TaskUpdate,
};
pub use services::DatabaseService;
pub use sync::{HttpBatchTransport, HttpProbe, SyncEngine, SyncPhase, SyncStatusSnapshot};
