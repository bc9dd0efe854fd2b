use super::test_helpers::*;
use super::*;
use crate::error::Error;
use crate::types::{FileId, FileStatus, TaskId, TaskModel, TaskStatus};
use std::sync::atomic::Ordering;
use std::time::Duration;

mod worker;
