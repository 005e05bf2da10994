//! `resizer status` and `resizer list`.

use std::path::Path;

use resizer::task::{TaskFilter, TaskStore};
use resizer::TaskStatus;
use serde::Serialize;

use crate::commands::common::{open, print_json, StatusArg};
use crate::error::CliError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskPage<T> {
    total: u64,
    counts: StatusCounts,
    tasks: Vec<T>,
}

#[derive(Serialize)]
struct StatusCounts {
    pending: u64,
    completed: u64,
    failed: u64,
}

pub fn status(config_path: &Path, task_id: &str) -> Result<(), CliError> {
    let (_config, db) = open(config_path)?;
    let store = TaskStore::new(db);
    let task = store
        .get(task_id)?
        .ok_or_else(|| resizer::TaskError::NotFound(task_id.to_string()))?;
    print_json(&task)
}

pub fn list(
    config_path: &Path,
    status: Option<StatusArg>,
    limit: u64,
    offset: u64,
) -> Result<(), CliError> {
    let (_config, db) = open(config_path)?;
    let store = TaskStore::new(db);
    let filter = TaskFilter {
        status: status.map(Into::into),
        original_reference: None,
        limit: Some(limit),
        offset: Some(offset),
    };
    let (tasks, total) = store.list(&filter)?;
    let counts = StatusCounts {
        pending: store.count(TaskStatus::Pending)?,
        completed: store.count(TaskStatus::Completed)?,
        failed: store.count(TaskStatus::Failed)?,
    };
    print_json(&TaskPage {
        total,
        counts,
        tasks,
    })
}
