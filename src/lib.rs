//! # task-dl
//!
//! Durable, concurrent download-task manager.
//!
//! A task is a list of file URLs. Submitting one persists it to SQLite and
//! returns its id immediately; a fixed pool of workers downloads the files
//! into local storage with bounded concurrency and writes every state
//! transition back to the database. Unfinished tasks are resumed on the next
//! start, interrupted ones ahead of those never dispatched.
//!
//! ## Design Philosophy
//!
//! task-dl is designed to be:
//! - **Durable** - The database is the single source of truth; a crash loses no accepted task
//! - **Bounded** - Fixed workers, a bounded queue and a per-task file limit
//! - **Library-first** - No CLI or HTTP layer, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use task_dl::{Config, TaskManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         worker_count: 8,
//!         ..Default::default()
//!     };
//!
//!     let manager = TaskManager::new(config).await?;
//!
//!     let id = manager
//!         .submit(["https://example.com/a.zip", "https://example.com/b.pdf"])
//!         .await?;
//!
//!     let report = manager.get_status(&id).await?;
//!     println!("task {} is {:?}", id, report.status);
//!
//!     manager.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Per-file download pipeline
pub mod fetch;
/// Task manager and worker pool (decomposed into focused submodules)
pub mod manager;
/// Retry logic with exponential backoff
pub mod retry;
/// Core task and file types
pub mod types;
/// Filename resolution helpers
pub mod utils;

// Re-export commonly used types
pub use config::{Config, RetryConfig};
pub use db::Database;
pub use error::{DatabaseError, DownloadError, Error, Result};
pub use fetch::{FileFetcher, HttpFetcher};
pub use manager::TaskManager;
pub use types::{FileId, FileModel, FileStatus, TaskId, TaskModel, TaskStatus, TaskStatusReport};

/// Helper function to run the manager with graceful signal handling.
///
/// Waits for a termination signal and then calls the manager's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use task_dl::{Config, TaskManager, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = TaskManager::new(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(manager).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: TaskManager) -> Result<()> {
    wait_for_signal().await;
    manager.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
