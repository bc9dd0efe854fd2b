//! Database layer for task-dl
//!
//! Handles SQLite persistence for the task counter and task records.
//!
//! ## Layout
//!
//! Two containers, both created at first open:
//! - `count`: a single big-endian 4-byte `u32` under the key [`TASK_COUNT_KEY`],
//!   the last issued task ordinal
//! - `tasks`: one JSON-encoded [`TaskModel`](crate::types::TaskModel) per task id
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: Database lifecycle, schema migrations
//! - [`counter`]: Task id allocation
//! - [`tasks`]: Task record CRUD and recovery scans

use sqlx::sqlite::SqlitePool;

mod counter;
mod migrations;
mod tasks;

/// Table holding the task counter
pub const COUNT_TABLE: &str = "count";

/// Table holding task records
pub const TASKS_TABLE: &str = "tasks";

/// Key of the task counter row
pub const TASK_COUNT_KEY: &str = "task_count";

/// Database handle for task-dl
///
/// Cheap to share behind an `Arc`; the pool is internally synchronized.
pub struct Database {
    pool: SqlitePool,
    /// Serializes counter read-modify-write transactions
    counter_lock: tokio::sync::Mutex<()>,
}
