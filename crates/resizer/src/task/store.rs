//! Task persistence on top of the `tasks` and `image_variants` tables.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::task_repo::{self, TaskRow};
use crate::db::variant_repo::{self, VariantRow};
use crate::db::{Database, DatabaseError};
use crate::error::TaskError;
use crate::task::model::{ImageVariant, Task, TaskStatus};

// ─── Helpers ────────────────────────────────────────────────────────────────

fn parse_status(s: &str, task_id: &str) -> TaskStatus {
    TaskStatus::parse(s).unwrap_or_else(|| {
        log::warn!(
            "Unknown task status '{}' for task {}, defaulting to Pending",
            s,
            task_id
        );
        TaskStatus::Pending
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn task_from_row(row: &TaskRow) -> Result<Task, DatabaseError> {
    let variants: Vec<ImageVariant> =
        serde_json::from_str(&row.variants).map_err(|source| DatabaseError::Json {
            column: "tasks.variants",
            source,
        })?;

    Ok(Task {
        task_id: row.id.clone(),
        status: parse_status(&row.status, &row.id),
        price: row.price,
        original_reference: row.original_reference.clone(),
        input_path: row.input_path.clone(),
        transient: row.transient,
        variants,
        error: row.error.clone(),
        processing_time_ms: row.processing_time_ms.map(|ms| ms.max(0) as u64),
        created_at: parse_timestamp(&row.created_at),
        updated_at: parse_timestamp(&row.updated_at),
    })
}

fn variant_from_row(row: &VariantRow) -> ImageVariant {
    ImageVariant {
        resolution: row.resolution,
        path: row.path.clone(),
        content_hash: row.content_hash.clone(),
        created_at: parse_timestamp(&row.created_at),
    }
}

fn to_millis(ms: Option<u64>) -> Option<i64> {
    ms.map(|ms| i64::try_from(ms).unwrap_or(i64::MAX))
}

// ─── Inputs ─────────────────────────────────────────────────────────────────

/// Fields the caller decides when a task is created.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub original_reference: String,
    pub input_path: String,
    pub transient: bool,
    pub price: f64,
}

/// A variant reported by a worker, before it is stamped and stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVariant {
    pub resolution: u32,
    pub path: String,
    pub content_hash: String,
}

/// Listing filter for tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub original_reference: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

// ─── TaskStore ──────────────────────────────────────────────────────────────

/// Reads tasks and applies the gated `pending -> terminal` transitions.
#[derive(Clone)]
pub struct TaskStore {
    db: Database,
}

impl TaskStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persists a new `pending` task with no variants.
    ///
    /// A second active task for the same reference violates the partial
    /// unique index and is reported as `DuplicateImage`.
    pub fn create(&self, new: NewTask) -> Result<Task, TaskError> {
        let now = format_timestamp(Utc::now());
        let row = TaskRow {
            id: Uuid::new_v4().to_string(),
            status: TaskStatus::Pending.as_str().to_string(),
            price: new.price,
            original_reference: new.original_reference,
            input_path: new.input_path,
            transient: new.transient,
            variants: "[]".to_string(),
            error: None,
            processing_time_ms: None,
            created_at: now.clone(),
            updated_at: now,
        };

        match task_repo::insert(&self.db, &row) {
            Ok(()) => Ok(task_from_row(&row)?),
            Err(e) if e.is_unique_violation() => {
                Err(TaskError::DuplicateImage(row.original_reference))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get(&self, task_id: &str) -> Result<Option<Task>, DatabaseError> {
        task_repo::find_by_id(&self.db, task_id)?
            .map(|row| task_from_row(&row))
            .transpose()
    }

    /// Returns one page of tasks (newest first) and the total match count.
    pub fn list(&self, filter: &TaskFilter) -> Result<(Vec<Task>, u64), DatabaseError> {
        let repo_filter = task_repo::TaskFilter {
            status: filter.status.map(|s| s.as_str().to_string()),
            original_reference: filter.original_reference.clone(),
            limit: filter.limit,
            offset: filter.offset,
        };
        let (rows, total) = task_repo::query(&self.db, &repo_filter)?;
        let tasks = rows
            .iter()
            .map(task_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((tasks, total))
    }

    pub fn count(&self, status: TaskStatus) -> Result<u64, DatabaseError> {
        task_repo::count_by_status(&self.db, status.as_str())
    }

    /// `pending -> completed`. Variants are stamped with the current instant
    /// and indexed in `image_variants` in the same transaction.
    ///
    /// Returns `false` when the task is missing or no longer pending.
    pub fn complete(
        &self,
        task_id: &str,
        variants: &[NewVariant],
        processing_time_ms: Option<u64>,
    ) -> Result<bool, DatabaseError> {
        let Some(row) = task_repo::find_by_id(&self.db, task_id)? else {
            return Ok(false);
        };

        let now = Utc::now();
        let stamped: Vec<ImageVariant> = variants
            .iter()
            .map(|v| ImageVariant {
                resolution: v.resolution,
                path: v.path.clone(),
                content_hash: v.content_hash.clone(),
                created_at: now,
            })
            .collect();
        let variants_json = serde_json::to_string(&stamped).map_err(|source| DatabaseError::Json {
            column: "tasks.variants",
            source,
        })?;

        let now = format_timestamp(now);
        let index_rows: Vec<VariantRow> = variants
            .iter()
            .map(|v| VariantRow {
                task_id: task_id.to_string(),
                original_reference: row.original_reference.clone(),
                resolution: v.resolution,
                path: v.path.clone(),
                content_hash: v.content_hash.clone(),
                created_at: now.clone(),
            })
            .collect();

        task_repo::complete_if_pending(
            &self.db,
            task_id,
            &variants_json,
            &index_rows,
            to_millis(processing_time_ms),
            &now,
        )
    }

    /// `pending -> failed`. Returns `false` when the task is not pending.
    pub fn fail(
        &self,
        task_id: &str,
        error: &str,
        processing_time_ms: Option<u64>,
    ) -> Result<bool, DatabaseError> {
        task_repo::fail_if_pending(
            &self.db,
            task_id,
            error,
            to_millis(processing_time_ms),
            &format_timestamp(Utc::now()),
        )
    }

    pub fn variants_for_task(&self, task_id: &str) -> Result<Vec<ImageVariant>, DatabaseError> {
        let rows = variant_repo::find_by_task(&self.db, task_id)?;
        Ok(rows.iter().map(variant_from_row).collect())
    }

    pub fn variants_for_reference(
        &self,
        reference: &str,
    ) -> Result<Vec<ImageVariant>, DatabaseError> {
        let rows = variant_repo::find_by_original_reference(&self.db, reference)?;
        Ok(rows.iter().map(variant_from_row).collect())
    }
}
