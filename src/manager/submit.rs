//! Task submission and status queries.

use std::sync::atomic::Ordering;

use crate::error::{Error, Result};
use crate::types::{TaskId, TaskModel, TaskStatusReport};

use super::TaskManager;

impl TaskManager {
    /// Submit a new task with one file per URL
    ///
    /// Validates the URLs, allocates an id, persists the task as `Await` and
    /// enqueues it. Waits while the queue is full. Returns the task id.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for an empty list or a URL that is not
    ///   `http`/`https`; nothing is written and no id is consumed
    /// - [`Error::ShuttingDown`] once shutdown has begun
    /// - a store error if the id or the record could not be persisted
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use task_dl::{Config, TaskManager};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let manager = TaskManager::new(Config::default()).await?;
    /// let id = manager
    ///     .submit(["https://example.com/a.zip", "https://example.com/b.zip"])
    ///     .await?;
    /// println!("submitted task {}", id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn submit<I, S>(&self, urls: I) -> Result<TaskId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: Vec<String> = urls.into_iter().map(Into::into).collect();
        validate_urls(&urls)?;

        if !self.pool.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let id = self.db.next_task_id().await?;
        let task = TaskModel::new(id.clone(), &urls);
        self.db.save_task(&task).await?;

        tracing::info!(task_id = %id, files = urls.len(), "Task submitted");

        self.enqueue(task).await?;
        Ok(id)
    }

    /// Current status of a task and each of its files
    ///
    /// Read-only; served from the store.
    pub async fn get_status(&self, id: &TaskId) -> Result<TaskStatusReport> {
        Ok(self.db.load_task(id).await?.report())
    }

    /// Full stored record of a task, including resolved filenames and errors
    pub async fn get_task(&self, id: &TaskId) -> Result<TaskModel> {
        self.db.load_task(id).await
    }
}

/// Reject an empty list or any URL that is not absolute `http`/`https`
pub(crate) fn validate_urls(urls: &[String]) -> Result<()> {
    if urls.is_empty() {
        return Err(Error::Validation("task must contain at least one URL".into()));
    }

    for (index, raw) in urls.iter().enumerate() {
        let parsed = url::Url::parse(raw)
            .map_err(|e| Error::Validation(format!("URL {} ({:?}) is invalid: {}", index, raw, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Validation(format!(
                "URL {} ({:?}) has unsupported scheme '{}'",
                index,
                raw,
                parsed.scheme()
            )));
        }
    }

    Ok(())
}
