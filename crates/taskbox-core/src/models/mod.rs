//! Data models for Taskbox

mod outbox;
mod sync_conflict;
mod sync_report;
mod task;

pub use outbox::{FailureOutcome, OutboxEntry, OutboxEntryId, SyncOperation};
pub use sync_conflict::{SyncConflict, Winner};
pub use sync_report::{CycleOutcome, SyncErrorEntry, SyncReport, SYSTEM_RECORD_ID};
pub use task::{NewTask, RemoteTask, SyncStatus, Task, TaskId, TaskSnapshot, TaskUpdate};
