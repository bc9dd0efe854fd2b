//! Core types for task-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for a task
///
/// The decimal rendering of the store's task counter. Ordering is numeric,
/// so `"10"` sorts after `"9"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Build the identifier for a counter value
    pub fn from_ordinal(ordinal: u32) -> Self {
        Self(ordinal.to_string())
    }

    /// Numeric value of the identifier, if it is one
    pub fn ordinal(&self) -> Option<u32> {
        self.0.parse().ok()
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Numeric order for decimal ids; non-numeric ids sort after numeric ones
fn cmp_numeric(a: &str, b: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match (a.parse::<u64>().ok(), b.parse::<u64>().ok()) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

impl Ord for TaskId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        cmp_numeric(&self.0, &other.0)
    }
}

impl PartialOrd for TaskId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of a file within its task (the submission index)
///
/// Ordering follows the index, so `"10"` sorts after `"2"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    /// Identifier for the file at `index` in the submitted URL list
    pub fn from_index(index: usize) -> Self {
        Self(index.to_string())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for FileId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        cmp_numeric(&self.0, &other.0)
    }
}

impl PartialOrd for FileId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Persisted, not yet picked up by a worker
    Await,
    /// Owned by a worker
    InProgress,
    /// Every file downloaded
    Done,
    /// Every file failed
    Failed,
    /// Some files downloaded, the rest failed
    PartialDone,
}

impl TaskStatus {
    /// True for statuses a task never leaves
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::Failed | TaskStatus::PartialDone
        )
    }

    /// Aggregate status once every file is terminal, `None` while any file is pending
    ///
    /// All `Done` gives `Done`, all `Failed` gives `Failed`, anything else `PartialDone`.
    pub fn aggregate(files: &[FileModel]) -> Option<TaskStatus> {
        if files.is_empty() || files.iter().any(|f| !f.status.is_terminal()) {
            return None;
        }

        let done = files
            .iter()
            .filter(|f| f.status == FileStatus::Done)
            .count();

        Some(if done == files.len() {
            TaskStatus::Done
        } else if done == 0 {
            TaskStatus::Failed
        } else {
            TaskStatus::PartialDone
        })
    }
}

/// File status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Not yet attempted
    Await,
    /// Download in flight
    Downloading,
    /// Written to its final path
    Done,
    /// Failed after all retries
    Failed,
}

impl FileStatus {
    /// True for `Done` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Done | FileStatus::Failed)
    }
}

/// One URL-to-disk unit of a task
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileModel {
    /// Index-based identifier, unique within the task
    pub id: FileId,
    /// Source URL
    pub url: String,
    /// Final file name on disk, empty until the download completes
    #[serde(default)]
    pub filename: String,
    /// Current status
    pub status: FileStatus,
    /// Last error message, empty when none
    #[serde(default)]
    pub error: String,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl FileModel {
    /// New file awaiting download
    pub fn new(id: FileId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            filename: String::new(),
            status: FileStatus::Await,
            error: String::new(),
            updated_at: Utc::now(),
        }
    }

    /// Record a completed download
    pub fn mark_done(&mut self, filename: impl Into<String>) {
        self.filename = filename.into();
        self.status = FileStatus::Done;
        self.error.clear();
        self.updated_at = Utc::now();
    }

    /// Record a terminal failure
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.filename.clear();
        self.status = FileStatus::Failed;
        self.error = error.into();
        self.updated_at = Utc::now();
    }
}

/// A submitted set of files, the unit of scheduling and storage
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskModel {
    /// Task identifier
    pub id: TaskId,
    /// Current status, always derivable from `files`
    pub status: TaskStatus,
    /// Files in submission order
    pub files: Vec<FileModel>,
    /// Submission time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl TaskModel {
    /// New `Await` task with one `Await` file per URL
    pub fn new(id: TaskId, urls: &[String]) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: TaskStatus::Await,
            files: urls
                .iter()
                .enumerate()
                .map(|(index, url)| FileModel::new(FileId::from_index(index), url.clone()))
                .collect(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Status implied by the files
    ///
    /// Terminal once every file is terminal; `Await` only while the task was
    /// never dispatched and no file has moved; `InProgress` otherwise.
    pub fn derived_status(&self) -> TaskStatus {
        if let Some(terminal) = TaskStatus::aggregate(&self.files) {
            return terminal;
        }
        if self.status == TaskStatus::Await
            && self.files.iter().all(|f| f.status == FileStatus::Await)
        {
            TaskStatus::Await
        } else {
            TaskStatus::InProgress
        }
    }

    /// Recompute `status` from the files and bump `updated_at`
    pub fn refresh_status(&mut self) {
        self.status = self.derived_status();
        self.updated_at = Utc::now();
    }

    /// True when `status` matches the files
    pub fn is_consistent(&self) -> bool {
        self.status == self.derived_status()
    }

    /// Find a file by id
    pub fn file(&self, id: &FileId) -> Option<&FileModel> {
        self.files.iter().find(|f| &f.id == id)
    }

    /// Replace the stored entry for `file` (matched by id)
    pub fn update_file(&mut self, file: FileModel) -> bool {
        match self.files.iter_mut().find(|f| f.id == file.id) {
            Some(slot) => {
                *slot = file;
                true
            }
            None => false,
        }
    }

    /// Status snapshot for callers of the facade
    pub fn report(&self) -> TaskStatusReport {
        TaskStatusReport {
            id: self.id.clone(),
            status: self.status,
            files: self
                .files
                .iter()
                .map(|f| (f.id.clone(), f.status))
                .collect(),
        }
    }
}

/// Result of a status query: the task status plus every file's status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusReport {
    /// Task identifier
    pub id: TaskId,
    /// Task status
    pub status: TaskStatus,
    /// File statuses keyed by file id
    pub files: BTreeMap<FileId, FileStatus>,
}
