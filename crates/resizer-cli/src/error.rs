use resizer::{ConfigError, DatabaseError, ResizerError, StorageError, TaskError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Resizer(#[from] ResizerError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}
