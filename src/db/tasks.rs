//! Task record CRUD and recovery scans.

use crate::types::{TaskId, TaskModel, TaskStatus};
use crate::{Error, Result};

use super::migrations::query_error;
use super::{Database, TASKS_TABLE};

impl Database {
    /// Insert or replace the record for `task.id`
    ///
    /// The whole record is rewritten in a single statement, so a reader never
    /// observes a partially updated task.
    pub async fn save_task(&self, task: &TaskModel) -> Result<()> {
        let data = serde_json::to_string(task)?;

        sqlx::query(&format!(
            "INSERT INTO {TASKS_TABLE} (id, data) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET data = excluded.data"
        ))
        .bind(task.id.as_str())
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(|e| query_error("Failed to save task", e))?;

        tracing::trace!(task_id = %task.id, status = ?task.status, "Task saved");
        Ok(())
    }

    /// Load the record for `id`, failing with [`Error::NotFound`] when absent
    pub async fn load_task(&self, id: &TaskId) -> Result<TaskModel> {
        let data: Option<String> =
            sqlx::query_scalar(&format!("SELECT data FROM {TASKS_TABLE} WHERE id = ?"))
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| query_error("Failed to load task", e))?;

        match data {
            Some(data) => Ok(serde_json::from_str(&data)?),
            None => Err(Error::NotFound(id.to_string())),
        }
    }

    /// All tasks with the given status, in ascending numeric id order
    ///
    /// Full scan; any record that fails to decode fails the whole call.
    pub async fn list_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<TaskModel>> {
        let tasks = self.list_tasks().await?;
        Ok(tasks.into_iter().filter(|t| t.status == status).collect())
    }

    /// Every task record, in ascending numeric id order
    pub async fn list_tasks(&self) -> Result<Vec<TaskModel>> {
        let rows: Vec<String> = sqlx::query_scalar(&format!("SELECT data FROM {TASKS_TABLE}"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error("Failed to list tasks", e))?;

        let mut tasks = rows
            .iter()
            .map(|data| serde_json::from_str::<TaskModel>(data))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }
}
