pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod logging;
pub mod sanitize;
pub mod storage;
pub mod task;
pub mod transform;
pub mod worker;

pub use config::{load_config, load_config_from_str, Config, WorkerMode};
pub use coordinator::{Coordinator, InputReference, TaskEvent};
pub use db::{Database, DatabaseError};
pub use error::{
    ConfigError, ResizerError, Result, StorageError, TaskError, TransformError, WorkerError,
};
pub use logging::{init_logging, LogFormat};
pub use task::{CreatedTask, ImageVariant, Task, TaskFilter, TaskStatus};
pub use worker::{run_job, Dispatcher, ProcessDispatcher, ThreadDispatcher, WorkerJob, WorkerMessage};
