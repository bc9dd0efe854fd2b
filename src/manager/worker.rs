//! Worker loops and per-task file processing.

use chrono::Utc;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;

use crate::error::DownloadError;
use crate::retry::with_retry;
use crate::types::{FileModel, FileStatus, TaskId, TaskModel, TaskStatus};

use super::TaskManager;

impl TaskManager {
    /// Spawn `worker_count` worker loops sharing the queue receiver
    pub(crate) async fn spawn_workers(&self) {
        let mut workers = self.pool.workers.lock().await;
        for worker_id in 0..self.config.worker_count {
            let manager = self.clone();
            workers.push(tokio::spawn(async move {
                manager.run_worker(worker_id).await;
            }));
        }

        tracing::info!(
            worker_count = self.config.worker_count,
            queue_capacity = self.config.queue_capacity,
            "Worker pool started"
        );
    }

    /// Dequeue and process tasks until shutdown
    async fn run_worker(&self, worker_id: usize) {
        tracing::debug!(worker_id, "Worker started");

        loop {
            let next = {
                let mut receiver = tokio::select! {
                    biased;
                    _ = self.pool.shutdown.cancelled() => break,
                    guard = self.pool.receiver.lock() => guard,
                };

                tokio::select! {
                    biased;
                    _ = self.pool.shutdown.cancelled() => break,
                    task = receiver.recv() => task,
                }
            };

            let Some(task) = next else {
                break;
            };

            tracing::info!(worker_id, task_id = %task.id, files = task.files.len(), "Task dispatched");
            self.process_task(task).await;
        }

        tracing::debug!(worker_id, "Worker stopped");
    }

    /// Drive every non-terminal file of `task` to a terminal state
    ///
    /// The worker owns `task` for the duration; each change is applied to this
    /// copy, the task status is recomputed and the whole record persisted. At
    /// most `max_concurrent_files` downloads run at once. After shutdown no new
    /// file is started and cancelled files are returned to `Await`.
    pub(crate) async fn process_task(&self, mut task: TaskModel) {
        // A download that never finished before a restart starts over
        for file in task.files.iter_mut() {
            if file.status == FileStatus::Downloading {
                file.status = FileStatus::Await;
            }
        }

        if task.status == TaskStatus::Await {
            task.status = TaskStatus::InProgress;
        }
        task.refresh_status();
        self.persist(&task).await;

        let dest_dir = self.config.storage_dir.join(task.id.as_str());
        let mut pending: VecDeque<FileModel> = task
            .files
            .iter()
            .filter(|f| !f.status.is_terminal())
            .cloned()
            .collect();
        let mut in_flight = FuturesUnordered::new();
        let limit = self.config.max_concurrent_files;

        loop {
            let mut started = false;
            while in_flight.len() < limit && !self.pool.shutdown.is_cancelled() {
                let Some(mut file) = pending.pop_front() else {
                    break;
                };
                file.status = FileStatus::Downloading;
                file.updated_at = Utc::now();
                task.update_file(file.clone());
                in_flight.push(self.fetch_file(task.id.clone(), file, dest_dir.clone()));
                started = true;
            }

            if started {
                task.refresh_status();
                self.persist(&task).await;
            }

            let Some((mut file, outcome)) = in_flight.next().await else {
                break;
            };

            match outcome {
                Ok(done) => {
                    file = done;
                }
                Err(DownloadError::Cancelled) => {
                    tracing::debug!(task_id = %task.id, file_id = %file.id, "Download cancelled by shutdown");
                    file.status = FileStatus::Await;
                    file.updated_at = Utc::now();
                }
                Err(e) => {
                    tracing::warn!(
                        task_id = %task.id,
                        file_id = %file.id,
                        url = %file.url,
                        error = %e,
                        "File download failed"
                    );
                    file.mark_failed(e.to_string());
                }
            }

            task.update_file(file);
            task.refresh_status();
            self.persist(&task).await;
        }

        if task.status.is_terminal() {
            let done = task
                .files
                .iter()
                .filter(|f| f.status == FileStatus::Done)
                .count();
            tracing::info!(
                task_id = %task.id,
                status = ?task.status,
                done,
                failed = task.files.len() - done,
                "Task finished"
            );
        } else {
            tracing::info!(
                task_id = %task.id,
                remaining = task.files.iter().filter(|f| !f.status.is_terminal()).count(),
                "Task interrupted by shutdown, will resume on next start"
            );
        }
    }

    /// Fetch one file, yielding the dispatched copy alongside the outcome
    fn fetch_file(
        &self,
        task_id: TaskId,
        file: FileModel,
        dest_dir: PathBuf,
    ) -> impl Future<Output = (FileModel, Result<FileModel, DownloadError>)> + Send + use<> {
        let fetcher = self.fetcher.clone();
        let abort = self.pool.abort.clone();

        async move {
            let outcome = fetcher
                .fetch(&task_id, file.clone(), &dest_dir, &abort)
                .await;
            (file, outcome)
        }
    }

    /// Write the worker's copy of `task` to the store
    ///
    /// Retried under the `persist_retry` policy. A final failure is logged and
    /// the worker carries on; the next successful write or the next restart's
    /// recovery brings the record up to date.
    pub(crate) async fn persist(&self, task: &TaskModel) {
        debug_assert!(task.is_consistent());

        if let Err(e) = with_retry(&self.config.persist_retry, || self.db.save_task(task)).await {
            tracing::warn!(
                task_id = %task.id,
                status = ?task.status,
                error = %e,
                "Failed to persist task state, stored record is behind"
            );
        }
    }
}
