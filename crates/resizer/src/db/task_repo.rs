//! Task repository: CRUD operations for the `tasks` table, plus the
//! pending-gated terminal transitions.

use rusqlite::{params, Row};

use super::variant_repo::{self, VariantRow};
use super::{Database, DatabaseError};

/// A raw task row from the database.
#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub status: String,
    pub price: f64,
    pub original_reference: String,
    pub input_path: String,
    pub transient: bool,
    /// JSON array of embedded variants.
    pub variants: String,
    pub error: Option<String>,
    pub processing_time_ms: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            status: row.get("status")?,
            price: row.get("price")?,
            original_reference: row.get("original_reference")?,
            input_path: row.get("input_path")?,
            transient: row.get("transient")?,
            variants: row.get("variants")?,
            error: row.get("error")?,
            processing_time_ms: row.get("processing_time_ms")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    #[cfg(test)]
    pub(crate) fn sample(id: &str, reference: &str) -> Self {
        Self {
            id: id.to_string(),
            status: "pending".to_string(),
            price: 12.5,
            original_reference: reference.to_string(),
            input_path: reference.to_string(),
            transient: false,
            variants: "[]".to_string(),
            error: None,
            processing_time_ms: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }
}

/// Query filter parameters for task listing.
#[derive(Debug, Default, Clone)]
pub struct TaskFilter {
    pub status: Option<String>,
    pub original_reference: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new task row.
pub fn insert(db: &Database, task: &TaskRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO tasks (id, status, price, original_reference, input_path, transient,
             variants, error, processing_time_ms, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                task.id,
                task.status,
                task.price,
                task.original_reference,
                task.input_path,
                task.transient,
                task.variants,
                task.error,
                task.processing_time_ms,
                task.created_at,
                task.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a task by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<TaskRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], TaskRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Queries tasks with filters, returning (rows, total_count).
pub fn query(db: &Database, filter: &TaskFilter) -> Result<(Vec<TaskRow>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.clone()));
        }
        if let Some(ref reference) = filter.original_reference {
            conditions.push(format!("original_reference = ?{}", param_values.len() + 1));
            param_values.push(Box::new(reference.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM tasks {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM tasks {} ORDER BY created_at DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<TaskRow> = stmt
            .query_map(params_ref.as_slice(), TaskRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Counts tasks with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Returns true if a pending or completed task holds the reference.
pub fn exists_active_reference(db: &Database, reference: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE original_reference = ?1 AND status != 'failed')",
            params![reference],
            |r| r.get(0),
        )?;
        Ok(exists)
    })
}

/// Moves a pending task to `completed`, embedding `variants_json` and
/// inserting one index row per variant in the same transaction.
///
/// Returns `false` (and writes nothing) if the task is not pending.
pub fn complete_if_pending(
    db: &Database,
    id: &str,
    variants_json: &str,
    variant_rows: &[VariantRow],
    processing_time_ms: Option<i64>,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    let (completed, ()) = db.with_transaction(|tx| {
        let changed = tx.execute(
            "UPDATE tasks SET status = 'completed', variants = ?2, error = NULL,
             processing_time_ms = ?3, updated_at = ?4
             WHERE id = ?1 AND status = 'pending'",
            params![id, variants_json, processing_time_ms, updated_at],
        )?;
        if changed == 0 {
            return Ok((false, ()));
        }
        for row in variant_rows {
            variant_repo::insert_with_conn(tx, row)?;
        }
        Ok((true, ()))
    })?;
    Ok(completed)
}

/// Moves a pending task to `failed` with the given reason.
///
/// Returns `false` if the task is not pending.
pub fn fail_if_pending(
    db: &Database,
    id: &str,
    error: &str,
    processing_time_ms: Option<i64>,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE tasks SET status = 'failed', variants = '[]', error = ?2,
             processing_time_ms = ?3, updated_at = ?4
             WHERE id = ?1 AND status = 'pending'",
            params![id, error, processing_time_ms, updated_at],
        )?;
        Ok(changed == 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn variant(task_id: &str, resolution: u32) -> VariantRow {
        VariantRow {
            task_id: task_id.to_string(),
            original_reference: "/input/a.jpg".to_string(),
            resolution,
            path: format!("/output/a/{}/ff.jpg", resolution),
            content_hash: "ff".to_string(),
            created_at: "2026-01-01T01:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &TaskRow::sample("task-1", "/input/a.jpg")).unwrap();

        let found = find_by_id(&db, "task-1").unwrap().unwrap();
        assert_eq!(found.status, "pending");
        assert_eq!(found.price, 12.5);
        assert_eq!(found.original_reference, "/input/a.jpg");
        assert!(!found.transient);
        assert_eq!(found.variants, "[]");
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_insert_second_active_reference_is_unique_violation() {
        let db = test_db();
        insert(&db, &TaskRow::sample("task-1", "/input/a.jpg")).unwrap();
        let err = insert(&db, &TaskRow::sample("task-2", "/input/a.jpg")).unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn test_complete_if_pending() {
        let db = test_db();
        insert(&db, &TaskRow::sample("task-1", "/input/a.jpg")).unwrap();

        let rows = vec![variant("task-1", 1024), variant("task-1", 800)];
        let applied = complete_if_pending(
            &db,
            "task-1",
            r#"[{"resolution":1024},{"resolution":800}]"#,
            &rows,
            Some(42),
            "2026-01-01T01:00:00Z",
        )
        .unwrap();
        assert!(applied);

        let found = find_by_id(&db, "task-1").unwrap().unwrap();
        assert_eq!(found.status, "completed");
        assert_eq!(found.processing_time_ms, Some(42));
        assert_eq!(found.updated_at, "2026-01-01T01:00:00Z");
        assert_eq!(variant_repo::find_by_task(&db, "task-1").unwrap().len(), 2);
    }

    #[test]
    fn test_complete_twice_is_noop() {
        let db = test_db();
        insert(&db, &TaskRow::sample("task-1", "/input/a.jpg")).unwrap();
        let rows = vec![variant("task-1", 800)];

        assert!(complete_if_pending(&db, "task-1", "[]", &rows, None, "2026-01-01T01:00:00Z").unwrap());
        assert!(!complete_if_pending(&db, "task-1", "[]", &rows, None, "2026-01-01T02:00:00Z").unwrap());

        let found = find_by_id(&db, "task-1").unwrap().unwrap();
        assert_eq!(found.updated_at, "2026-01-01T01:00:00Z");
        assert_eq!(variant_repo::find_by_task(&db, "task-1").unwrap().len(), 1);
    }

    #[test]
    fn test_fail_if_pending() {
        let db = test_db();
        insert(&db, &TaskRow::sample("task-1", "/input/a.jpg")).unwrap();

        assert!(fail_if_pending(&db, "task-1", "boom", Some(5), "2026-01-01T01:00:00Z").unwrap());
        assert!(!fail_if_pending(&db, "task-1", "again", None, "2026-01-01T02:00:00Z").unwrap());

        let found = find_by_id(&db, "task-1").unwrap().unwrap();
        assert_eq!(found.status, "failed");
        assert_eq!(found.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_failed_task_frees_reference() {
        let db = test_db();
        insert(&db, &TaskRow::sample("task-1", "/input/a.jpg")).unwrap();
        assert!(exists_active_reference(&db, "/input/a.jpg").unwrap());

        fail_if_pending(&db, "task-1", "boom", None, "2026-01-01T01:00:00Z").unwrap();
        assert!(!exists_active_reference(&db, "/input/a.jpg").unwrap());

        insert(&db, &TaskRow::sample("task-2", "/input/a.jpg")).unwrap();
    }

    #[test]
    fn test_query_with_status_filter() {
        let db = test_db();
        insert(&db, &TaskRow::sample("s1", "/input/1.jpg")).unwrap();
        insert(&db, &TaskRow::sample("s2", "/input/2.jpg")).unwrap();
        fail_if_pending(&db, "s2", "boom", None, "2026-01-01T01:00:00Z").unwrap();

        let (rows, total) = query(
            &db,
            &TaskFilter {
                status: Some("failed".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].id, "s2");
    }

    #[test]
    fn test_query_pagination() {
        let db = test_db();
        for i in 0..10 {
            let mut task = TaskRow::sample(&format!("p{}", i), &format!("/input/{}.jpg", i));
            task.created_at = format!("2026-01-{:02}T00:00:00Z", i + 1);
            insert(&db, &task).unwrap();
        }

        let (rows, total) = query(
            &db,
            &TaskFilter {
                limit: Some(3),
                offset: Some(0),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 10);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].id, "p9");
    }

    #[test]
    fn test_count_by_status() {
        let db = test_db();
        insert(&db, &TaskRow::sample("c1", "/input/1.jpg")).unwrap();
        insert(&db, &TaskRow::sample("c2", "/input/2.jpg")).unwrap();
        fail_if_pending(&db, "c2", "boom", None, "2026-01-01T01:00:00Z").unwrap();

        assert_eq!(count_by_status(&db, "pending").unwrap(), 1);
        assert_eq!(count_by_status(&db, "failed").unwrap(), 1);
        assert_eq!(count_by_status(&db, "completed").unwrap(), 0);
    }
}
