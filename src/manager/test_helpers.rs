//! Shared test helpers for creating TaskManager instances in tests.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, RetryConfig};
use crate::error::DownloadError;
use crate::fetch::FileFetcher;
use crate::manager::TaskManager;
use crate::types::{FileId, FileModel, TaskId, TaskStatus, TaskStatusReport};
use crate::utils::final_filename;

/// Config rooted in `dir` with small, fast settings
pub(crate) fn test_config(dir: &Path) -> Config {
    let no_wait = RetryConfig {
        max_attempts: 1,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
        max_elapsed: None,
    };

    Config {
        worker_count: 2,
        max_concurrent_files: 4,
        queue_capacity: 16,
        storage_dir: dir.join("storage"),
        database_path: dir.join("database").join("tasks.db"),
        request_timeout: Duration::from_secs(5),
        shutdown_grace: Duration::from_millis(200),
        retry: no_wait.clone(),
        persist_retry: no_wait,
    }
}

/// Helper to create a test TaskManager with a persistent database.
/// Returns the manager and the tempdir (which must be kept alive).
pub(crate) async fn create_test_manager(fetcher: Arc<StubFetcher>) -> (TaskManager, TempDir) {
    let temp_dir = tempdir().unwrap();
    let manager = TaskManager::with_fetcher(test_config(temp_dir.path()), fetcher)
        .await
        .unwrap();
    (manager, temp_dir)
}

/// Poll the store until the task reaches a terminal status
pub(crate) async fn wait_for_terminal(manager: &TaskManager, id: &TaskId) -> TaskStatusReport {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let report = manager.get_status(id).await.unwrap();
            if report.status.is_terminal() {
                return report;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task did not reach a terminal status in time")
}

/// Poll the store until the task has the given status
pub(crate) async fn wait_for_status(manager: &TaskManager, id: &TaskId, status: TaskStatus) {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if manager.get_status(id).await.unwrap().status == status {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task did not reach the expected status in time")
}

/// In-memory fetcher: URLs containing `fail` fail permanently, the rest succeed
///
/// Optionally sleeps per file or blocks on a gate until permits are added.
#[derive(Default)]
pub(crate) struct StubFetcher {
    pub(crate) delay: Duration,
    pub(crate) gate: Option<Arc<Semaphore>>,
    pub(crate) calls: Mutex<Vec<(TaskId, FileId)>>,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
}

impl StubFetcher {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    /// Fetcher that blocks every file until permits are added to the gate
    pub(crate) fn gated() -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(Self {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        (fetcher, gate)
    }

    pub(crate) fn calls(&self) -> Vec<(TaskId, FileId)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileFetcher for StubFetcher {
    async fn fetch(
        &self,
        task_id: &TaskId,
        mut file: FileModel,
        _dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<FileModel, DownloadError> {
        self.calls
            .lock()
            .unwrap()
            .push((task_id.clone(), file.id.clone()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let work = async {
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }
            tokio::time::sleep(self.delay).await;
        };

        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = work => false,
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if cancelled {
            return Err(DownloadError::Cancelled);
        }
        if file.url.contains("fail") {
            return Err(DownloadError::Permanent(format!("HTTP 500 for {}", file.url)));
        }

        file.mark_done(final_filename(task_id, &file.id, "stub.bin"));
        Ok(file)
    }
}
