//! Task id allocation from the durable counter.

use crate::error::DatabaseError;
use crate::types::TaskId;
use crate::{Error, Result};
use sqlx::SqliteConnection;

use super::migrations::query_error;
use super::{COUNT_TABLE, Database, TASK_COUNT_KEY};

impl Database {
    /// Allocate the next task id
    ///
    /// Increments the counter and reads it back inside one `BEGIN IMMEDIATE`
    /// transaction, so the write lock is held from the first read. Calls are
    /// additionally serialized in-process; every returned id is strictly
    /// greater than all previously returned ids.
    ///
    /// Cancel safe: dropping the future before it completes rolls the
    /// transaction back and leaves the counter unchanged.
    pub async fn next_task_id(&self) -> Result<TaskId> {
        let _guard = self.counter_lock.lock().await;

        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| query_error("Failed to begin counter transaction", e))?;

        let next = match Self::increment_counter(&mut *tx).await {
            Ok(next) => next,
            Err(e) => {
                tracing::error!(error = %e, "Failed to allocate task id");
                return Err(e);
            }
        };

        tx.commit()
            .await
            .map_err(|e| query_error("Failed to commit task counter", e))?;

        tracing::debug!(task_id = next, "Allocated task id");
        Ok(TaskId::from_ordinal(next))
    }

    /// Read the last issued task ordinal without changing it
    pub async fn current_task_count(&self) -> Result<u32> {
        let raw: Option<Vec<u8>> = sqlx::query_scalar(&format!(
            "SELECT value FROM {COUNT_TABLE} WHERE key = ?"
        ))
        .bind(TASK_COUNT_KEY)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to read task counter", e))?;

        decode_counter(raw.as_deref())
    }

    async fn increment_counter(conn: &mut SqliteConnection) -> Result<u32> {
        let raw: Option<Vec<u8>> = sqlx::query_scalar(&format!(
            "SELECT value FROM {COUNT_TABLE} WHERE key = ?"
        ))
        .bind(TASK_COUNT_KEY)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| query_error("Failed to read task counter", e))?;

        let current = decode_counter(raw.as_deref())?;
        let next = current
            .checked_add(1)
            .ok_or(Error::Database(DatabaseError::CounterExhausted(current)))?;

        sqlx::query(&format!(
            "INSERT INTO {COUNT_TABLE} (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value"
        ))
        .bind(TASK_COUNT_KEY)
        .bind(encode_counter(next))
        .execute(&mut *conn)
        .await
        .map_err(|e| query_error("Failed to update task counter", e))?;

        Ok(next)
    }
}

/// Encode a counter value as 4 big-endian bytes
pub(super) fn encode_counter(value: u32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Decode a stored counter value; a missing row counts as zero
pub(super) fn decode_counter(raw: Option<&[u8]>) -> Result<u32> {
    match raw {
        None => Ok(0),
        Some(bytes) => {
            let bytes: [u8; 4] = bytes.try_into().map_err(|_| {
                Error::Database(DatabaseError::Corrupt(format!(
                    "task counter has {} bytes, expected 4",
                    bytes.len()
                )))
            })?;
            Ok(u32::from_be_bytes(bytes))
        }
    }
}
