//! Service layer shared by the API and CLI.

mod database;

pub use database::DatabaseService;
