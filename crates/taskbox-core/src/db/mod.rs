//! Database layer for Taskbox
//!
//! Uses libSQL in local mode. Tasks and the outbox share one database so every
//! local mutation and its queued intent commit together.

mod connection;
mod migrations;
mod outbox;
mod repository;

pub use connection::Database;
pub use outbox::LibSqlOutbox;
pub use repository::{LibSqlTaskRepository, TaskRepository};
