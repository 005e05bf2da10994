//! Shared helpers for commands that work against the task database.

use std::path::Path;

use clap::ValueEnum;
use resizer::{load_config, Config, Database, TaskStatus};
use serde::Serialize;

use crate::error::CliError;

/// Task status selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum StatusArg {
    Pending,
    Completed,
    Failed,
}

impl From<StatusArg> for TaskStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Pending => TaskStatus::Pending,
            StatusArg::Completed => TaskStatus::Completed,
            StatusArg::Failed => TaskStatus::Failed,
        }
    }
}

/// Loads the config file and opens the database it points at.
pub fn open(config_path: &Path) -> Result<(Config, Database), CliError> {
    let config = load_config(config_path)?;
    let db_path = config.database_path().ok_or_else(|| {
        CliError::Config(
            "Cannot determine a database location. Set database_path in the config file"
                .to_string(),
        )
    })?;
    tracing::debug!(path = %db_path.display(), "Using task database");
    let db = Database::open(&db_path)?;
    Ok((config, db))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
