//! Duplicate-submission detection by canonical source reference.

use crate::db::{task_repo, variant_repo, Database, DatabaseError};

/// Normalizes a reference so Windows- and Unix-style spellings of the same
/// resource compare equal.
pub fn canonicalize(reference: &str) -> String {
    reference.replace('\\', "/")
}

/// Answers "has this source already been accepted?".
///
/// This is a read-then-decide check. Two concurrent submissions can both
/// pass it; the partial unique index on `tasks.original_reference` rejects
/// the loser at insert time.
#[derive(Clone)]
pub struct DuplicateGuard {
    db: Database,
}

impl DuplicateGuard {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// True when variants were recorded against `canonical`, or a pending or
    /// completed task already holds it.
    pub fn is_duplicate(&self, canonical: &str) -> Result<bool, DatabaseError> {
        if variant_repo::exists_for_reference(&self.db, canonical)? {
            return Ok(true);
        }
        task_repo::exists_active_reference(&self.db, canonical)
    }
}
