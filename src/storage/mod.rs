//! Storage module for persisting audit jobs
//!
//! This module handles job persistence for the pipeline, including:
//! - The `JobStore` contract and the `JobPatch` partial update
//! - SQLite database initialization and schema management
//! - An in-memory store for tests and embedders

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryJobStore;
pub use sqlite::SqliteJobStore;
pub use traits::{JobPatch, JobStore, StorageError, StorageResult};

use std::path::Path;

/// Opens the SQLite job store at `path`, creating the schema if needed
///
/// # Returns
///
/// * `Ok(SqliteJobStore)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to open or initialize the database
pub fn open_storage(path: &Path) -> StorageResult<SqliteJobStore> {
    SqliteJobStore::open(path)
}
