use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResizerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Unprocessable image: {0}")]
    UnprocessableImage(String),

    #[error("Failed to encode variant at width {width}: {reason}")]
    Encode { width: u32, reason: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove file '{path}': {source}")]
    RemoveFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("No async runtime available to supervise worker process")]
    NoRuntime,
}

/// Errors surfaced to callers of the task coordinator.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Invalid image '{reference}': {reason}")]
    InvalidImage { reference: String, reason: String },

    #[error("Image already processed: {0}")]
    DuplicateImage(String),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Failed to dispatch task {task_id}: {source}")]
    DispatchFailure {
        task_id: String,
        #[source]
        source: WorkerError,
    },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, ResizerError>;
