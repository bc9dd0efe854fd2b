//! Common test utilities for task-dl integration tests

use std::path::Path;
use std::time::Duration;
use task_dl::{Config, RetryConfig, TaskId, TaskManager, TaskStatus, TaskStatusReport};

/// Retry policy with millisecond delays so failure paths finish quickly
pub fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        jitter: false,
        max_elapsed: Some(Duration::from_secs(5)),
    }
}

/// Config with storage and database inside `dir`
pub fn test_config(dir: &Path) -> Config {
    Config {
        worker_count: 2,
        max_concurrent_files: 4,
        queue_capacity: 8,
        storage_dir: dir.join("storage"),
        database_path: dir.join("database").join("tasks.db"),
        request_timeout: Duration::from_secs(10),
        shutdown_grace: Duration::from_secs(5),
        retry: fast_retry(2),
        persist_retry: fast_retry(2),
    }
}

/// Poll until the task reaches a terminal status
///
/// Panics after `timeout`.
pub async fn wait_for_terminal(
    manager: &TaskManager,
    id: &TaskId,
    timeout: Duration,
) -> TaskStatusReport {
    tokio::time::timeout(timeout, async {
        loop {
            let report = manager.get_status(id).await.unwrap();
            if report.status.is_terminal() {
                return report;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("task did not finish in time")
}

/// Poll until the task has `status`
#[allow(dead_code)]
pub async fn wait_for_status(manager: &TaskManager, id: &TaskId, status: TaskStatus) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while manager.get_status(id).await.unwrap().status != status {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("task did not reach the expected status in time")
}
