//! Graceful shutdown coordination.

use std::sync::atomic::Ordering;

use crate::error::Result;

use super::TaskManager;

impl TaskManager {
    /// Gracefully shut down the worker pool
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new submissions
    /// 2. Signals workers to stop dequeuing and to start no further files
    /// 3. Waits up to `shutdown_grace` for in-flight downloads to finish
    /// 4. Cancels whatever is still downloading and waits for every worker to exit
    ///
    /// Interrupted tasks stay `InProgress` in the database and resume on the
    /// next start. Calling this more than once is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        self.pool.accepting_new.store(false, Ordering::SeqCst);
        self.pool.shutdown.cancel();
        tracing::info!("Stopped accepting new tasks");

        let handles = std::mem::take(&mut *self.pool.workers.lock().await);
        let worker_count = handles.len();
        let mut workers = Box::pin(futures::future::join_all(handles));

        let results =
            match tokio::time::timeout(self.config.shutdown_grace, &mut workers).await {
                Ok(results) => {
                    tracing::info!(worker_count, "All workers finished gracefully");
                    results
                }
                Err(_) => {
                    tracing::warn!(
                        grace_secs = self.config.shutdown_grace.as_secs(),
                        "Timeout waiting for workers, cancelling in-flight downloads"
                    );
                    self.pool.abort.cancel();
                    workers.await
                }
            };

        for result in results {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// True once [`shutdown`](Self::shutdown) has begun
    pub fn is_shutting_down(&self) -> bool {
        !self.pool.accepting_new.load(Ordering::SeqCst)
    }
}
