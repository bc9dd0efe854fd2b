//! Task manager and worker pool, split into focused submodules.
//!
//! The `TaskManager` struct and its methods are organized by domain:
//! - [`submit`] - Submission and status queries
//! - [`queue`] - Bounded queue access and startup recovery
//! - [`worker`] - Worker loops and per-task file processing
//! - [`lifecycle`] - Graceful shutdown

mod lifecycle;
mod queue;
mod submit;
mod worker;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::fetch::{FileFetcher, HttpFetcher};
use crate::types::TaskModel;

/// Worker pool state: the bounded queue, its workers and their stop signals
#[derive(Clone)]
pub(crate) struct WorkerPool {
    /// Producer side of the bounded task queue
    pub(crate) sender: mpsc::Sender<TaskModel>,
    /// Consumer side, shared by every worker loop
    pub(crate) receiver: Arc<Mutex<mpsc::Receiver<TaskModel>>>,
    /// Cleared once shutdown begins; `submit` checks it first
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Stops dequeuing and stops workers from starting more files
    pub(crate) shutdown: CancellationToken,
    /// Cancels in-flight downloads once the shutdown grace period is over
    pub(crate) abort: CancellationToken,
    /// Handles of the spawned worker loops, drained by `shutdown`
    pub(crate) workers: Arc<Mutex<Vec<tokio::task::JoinHandle<()>>>>,
}

impl WorkerPool {
    fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity);
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            accepting_new: Arc::new(AtomicBool::new(true)),
            shutdown: CancellationToken::new(),
            abort: CancellationToken::new(),
            workers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// Task service facade (cloneable - all fields are Arc-wrapped)
///
/// Submits tasks, answers status queries and owns the worker pool that
/// downloads them. Every state transition is written to the [`Database`],
/// which is the only shared state between workers.
#[derive(Clone)]
pub struct TaskManager {
    /// Database instance for persistence (wrapped in Arc for sharing across tasks)
    /// Public for integration tests to inspect stored records
    pub db: Arc<Database>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Downloads individual files
    pub(crate) fetcher: Arc<dyn FileFetcher>,
    /// Queue, workers and shutdown signals
    pub(crate) pool: WorkerPool,
}

impl TaskManager {
    /// Create a new TaskManager downloading over HTTP(S)
    ///
    /// This initializes all core components:
    /// - Validates the configuration
    /// - Creates the storage directory
    /// - Opens/creates the SQLite database and runs migrations
    /// - Spawns `worker_count` worker loops
    /// - Re-enqueues unfinished tasks from the previous session
    ///   (`InProgress` first, then `Await`)
    pub async fn new(config: Config) -> Result<Self> {
        let fetcher = HttpFetcher::new(config.request_timeout, config.retry.clone())?;
        Self::with_fetcher(config, Arc::new(fetcher)).await
    }

    /// Create a new TaskManager with a custom file fetcher
    pub async fn with_fetcher(config: Config, fetcher: Arc<dyn FileFetcher>) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.storage_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create storage directory '{}': {}",
                        config.storage_dir.display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(&config.database_path).await?;

        let manager = Self {
            db: Arc::new(db),
            pool: WorkerPool::new(config.queue_capacity),
            config: Arc::new(config),
            fetcher,
        };

        // Workers first: recovery may enqueue more tasks than the queue holds
        manager.spawn_workers().await;

        if let Err(e) = manager.restore_queue().await {
            tracing::error!(error = %e, "Failed to restore unfinished tasks");
            manager.pool.shutdown.cancel();
            return Err(e);
        }

        Ok(manager)
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }
}
