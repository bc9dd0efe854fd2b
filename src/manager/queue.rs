//! Bounded queue access and startup recovery.

use crate::error::{Error, Result};
use crate::types::{TaskModel, TaskStatus};

use super::TaskManager;

impl TaskManager {
    /// Put a persisted task on the queue, waiting while it is full
    ///
    /// If shutdown begins while waiting the task is left in the store as is;
    /// the next start picks it up during recovery.
    pub(crate) async fn enqueue(&self, task: TaskModel) -> Result<()> {
        let id = task.id.clone();

        tokio::select! {
            biased;
            _ = self.pool.shutdown.cancelled() => {
                tracing::info!(
                    task_id = %id,
                    "Shutdown began while waiting for queue space, task left for the next start"
                );
                Ok(())
            }
            sent = self.pool.sender.send(task) => {
                sent.map_err(|_| Error::ShuttingDown)?;
                tracing::debug!(task_id = %id, "Task enqueued");
                Ok(())
            }
        }
    }

    /// Restore unfinished tasks from the database on startup
    ///
    /// The restoration process:
    /// 1. Lists tasks in `InProgress` (interrupted by the last shutdown or crash)
    /// 2. Lists tasks in `Await` (submitted but never dispatched)
    /// 3. Enqueues them in that order, each exactly once
    ///
    /// Terminal tasks are never re-enqueued. Returns the number restored.
    pub(crate) async fn restore_queue(&self) -> Result<usize> {
        let in_progress = self.db.list_tasks_by_status(TaskStatus::InProgress).await?;
        let awaiting = self.db.list_tasks_by_status(TaskStatus::Await).await?;

        if in_progress.is_empty() && awaiting.is_empty() {
            tracing::debug!("No unfinished tasks to restore");
            return Ok(0);
        }

        tracing::info!(
            in_progress = in_progress.len(),
            awaiting = awaiting.len(),
            "Restoring unfinished tasks"
        );

        let mut restored = 0;
        for task in in_progress.into_iter().chain(awaiting) {
            self.enqueue(task).await?;
            restored += 1;
        }

        tracing::info!(restored, "Unfinished tasks restored to queue");
        Ok(restored)
    }
}
