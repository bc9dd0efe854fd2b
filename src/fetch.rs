//! Per-file download pipeline
//!
//! A [`FileFetcher`] downloads one [`FileModel`] into a task directory and
//! hands back the updated model. It knows nothing about queues or the store;
//! the worker owning the task decides what to persist.
//!
//! [`HttpFetcher`] streams the response body to a hidden `.{name}.part`
//! sibling, syncs it and renames it into place, so a partially written file is
//! never visible under its final name.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::error::{DownloadError, Error, Result};
use crate::retry::with_retry;
use crate::types::{FileModel, TaskId};
use crate::utils::{final_filename, resolve_filename};

/// Downloads a single file of a task
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Fetch `file` into `dest_dir`
    ///
    /// On success the returned model is `Done` with its final `filename`.
    /// Failures are `Permanent` once retries are exhausted, or `Cancelled`
    /// when `cancel` fires first.
    async fn fetch(
        &self,
        task_id: &TaskId,
        file: FileModel,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> std::result::Result<FileModel, DownloadError>;
}

/// HTTP(S) GET fetcher with retry and atomic placement
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpFetcher {
    /// Build a fetcher whose requests time out after `request_timeout`
    pub fn new(request_timeout: Duration, retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "Failed to create HTTP client: {}",
                    e
                )))
            })?;

        Ok(Self { client, retry })
    }

    /// One GET attempt; returns the final file name
    async fn attempt(
        &self,
        task_id: &TaskId,
        file: &FileModel,
        dest_dir: &Path,
    ) -> std::result::Result<String, DownloadError> {
        let response = self
            .client
            .get(&file.url)
            .send()
            .await
            .map_err(|e| DownloadError::Transient(describe_request_error(&file.url, &e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Transient(format!(
                "HTTP {} for {}",
                status, file.url
            )));
        }

        let resolved = resolve_filename(response.headers(), &file.url);
        let name = final_filename(task_id, &file.id, &resolved);
        let final_path = dest_dir.join(&name);
        let part = PartFile::new(dest_dir.join(format!(".{}.part", name)));

        write_body(response, part.path(), &file.url).await?;

        tokio::fs::rename(part.path(), &final_path)
            .await
            .map_err(|e| {
                DownloadError::Permanent(format!(
                    "failed to move download into {}: {}",
                    final_path.display(),
                    e
                ))
            })?;
        part.persisted();

        Ok(name)
    }
}

#[async_trait]
impl FileFetcher for HttpFetcher {
    async fn fetch(
        &self,
        task_id: &TaskId,
        mut file: FileModel,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> std::result::Result<FileModel, DownloadError> {
        tokio::fs::create_dir_all(dest_dir).await.map_err(|e| {
            DownloadError::Permanent(format!(
                "failed to create {}: {}",
                dest_dir.display(),
                e
            ))
        })?;

        tracing::debug!(task_id = %task_id, file_id = %file.id, url = %file.url, "Downloading file");

        // Dropping the retry future on cancel drops any PartFile guard with it
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DownloadError::Cancelled),
            result = with_retry(&self.retry, || self.attempt(task_id, &file, dest_dir)) => {
                result.map_err(DownloadError::into_permanent)
            }
        };

        match outcome {
            Ok(name) => {
                tracing::debug!(task_id = %task_id, file_id = %file.id, filename = %name, "File downloaded");
                file.mark_done(name);
                Ok(file)
            }
            Err(e) => {
                tracing::debug!(task_id = %task_id, file_id = %file.id, error = %e, "File download failed");
                Err(e)
            }
        }
    }
}

/// Stream the response body into `path`, then flush and sync it
async fn write_body(
    mut response: reqwest::Response,
    path: &Path,
    url: &str,
) -> std::result::Result<(), DownloadError> {
    let local = |e: std::io::Error| {
        DownloadError::Permanent(format!("failed to write {}: {}", path.display(), e))
    };

    let mut out = tokio::fs::File::create(path).await.map_err(local)?;

    while let Some(chunk) = response.chunk().await.map_err(|e| {
        DownloadError::Transient(format!("failed to read body from {}: {}", url, e))
    })? {
        out.write_all(&chunk).await.map_err(local)?;
    }

    out.flush().await.map_err(local)?;
    out.sync_all().await.map_err(local)?;
    Ok(())
}

fn describe_request_error(url: &str, e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timeout fetching {}", url)
    } else if e.is_connect() {
        format!("connection failed for {}: {}", url, e)
    } else {
        format!("request to {} failed: {}", url, e)
    }
}

/// Temporary download file, removed on drop unless persisted
struct PartFile {
    path: PathBuf,
    keep: bool,
}

impl PartFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn persisted(mut self) {
        self.keep = true;
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
