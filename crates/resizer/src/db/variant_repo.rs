//! Variant repository: the `image_variants` index, keyed by task and by
//! origin reference.

use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};

/// A raw variant row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRow {
    pub task_id: String,
    pub original_reference: String,
    pub resolution: u32,
    pub path: String,
    pub content_hash: String,
    pub created_at: String,
}

impl VariantRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            task_id: row.get("task_id")?,
            original_reference: row.get("original_reference")?,
            resolution: row.get("resolution")?,
            path: row.get("path")?,
            content_hash: row.get("content_hash")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts a variant row on an already-locked connection (used inside
/// the task transition transaction).
pub(crate) fn insert_with_conn(conn: &Connection, row: &VariantRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO image_variants (task_id, original_reference, resolution, path, content_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            row.task_id,
            row.original_reference,
            row.resolution,
            row.path,
            row.content_hash,
            row.created_at,
        ],
    )?;
    Ok(())
}

/// Inserts a new variant row.
pub fn insert(db: &Database, row: &VariantRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| insert_with_conn(conn, row))
}

/// Returns all variants produced by a task, ordered by insertion.
pub fn find_by_task(db: &Database, task_id: &str) -> Result<Vec<VariantRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM image_variants WHERE task_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![task_id], VariantRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Returns all variants recorded against an origin reference.
pub fn find_by_original_reference(
    db: &Database,
    reference: &str,
) -> Result<Vec<VariantRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM image_variants WHERE original_reference = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![reference], VariantRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Returns true if at least one variant was recorded against the reference.
pub fn exists_for_reference(db: &Database, reference: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM image_variants WHERE original_reference = ?1)",
            params![reference],
            |r| r.get(0),
        )?;
        Ok(exists)
    })
}
