//! Task intake, dispatch and completion handling.
//!
//! `create_task` validates and persists a task, hands it to a
//! [`Dispatcher`] and returns while the task is still pending. Worker
//! messages arrive on an unbounded channel and are applied in arrival order
//! by a single listener task running on the tokio runtime.

mod completion;
pub mod events;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::db::Database;
use crate::error::{ResizerError, TaskError, WorkerError};
use crate::sanitize;
use crate::storage;
use crate::task::{
    canonicalize, CreatedTask, DuplicateGuard, ImageVariant, NewTask, PriceGenerator, RandomPrice,
    Task, TaskFilter, TaskStatus, TaskStore,
};
use crate::transform;
use crate::worker::dispatcher::{self, Dispatcher};
use crate::worker::{WorkerJob, WorkerMessage};

use completion::CompletionHandler;
pub use events::{TaskEvent, TaskEventBroadcaster};

/// Where a task's source image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputReference {
    /// A durable file owned by the caller. Its path is the canonical
    /// identity and it is never deleted.
    Path(PathBuf),
    /// A transient copy handed over to the coordinator. `canonical` is the
    /// caller's stable identifier for the content; the copy is deleted once
    /// the task is terminal or the submission is rejected.
    Upload { path: PathBuf, canonical: String },
}

impl InputReference {
    pub fn path(&self) -> &Path {
        match self {
            InputReference::Path(path) | InputReference::Upload { path, .. } => path,
        }
    }

    /// Canonical reference used for duplicate detection.
    pub fn canonical(&self) -> String {
        match self {
            InputReference::Path(path) => canonicalize(&path.to_string_lossy()),
            InputReference::Upload { canonical, .. } => canonicalize(canonical),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, InputReference::Upload { .. })
    }
}

pub struct Coordinator {
    store: TaskStore,
    guard: DuplicateGuard,
    dispatcher: Arc<dyn Dispatcher>,
    pricing: Arc<dyn PriceGenerator>,
    handler: CompletionHandler,
    events: TaskEventBroadcaster,
    completions: UnboundedSender<WorkerMessage>,
    listener: JoinHandle<()>,
    output_directory: PathBuf,
    resolutions: Vec<u32>,
}

impl Coordinator {
    /// Wires the coordinator and starts its completion listener.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: &Config,
        db: Database,
        dispatcher: Arc<dyn Dispatcher>,
        pricing: Arc<dyn PriceGenerator>,
    ) -> Result<Self, WorkerError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| WorkerError::NoRuntime)?;

        let store = TaskStore::new(db.clone());
        let events = TaskEventBroadcaster::default();
        let handler = CompletionHandler::new(
            store.clone(),
            events.clone(),
            config.resolutions.clone(),
        );

        let (completions, receiver) = mpsc::unbounded_channel();
        let listener = runtime.spawn(listen(receiver, handler.clone()));

        info!(
            output_directory = %config.output_directory,
            resolutions = ?config.resolutions,
            "Coordinator started"
        );

        Ok(Self {
            store,
            guard: DuplicateGuard::new(db),
            dispatcher,
            pricing,
            handler,
            events,
            completions,
            listener,
            output_directory: PathBuf::from(&config.output_directory),
            resolutions: config.resolutions.clone(),
        })
    }

    /// Builds the dispatcher and price generator the config describes.
    pub fn from_config(config: &Config, db: Database) -> Result<Self, ResizerError> {
        let dispatcher = dispatcher::from_config(&config.worker)?;
        let pricing = Arc::new(RandomPrice::from_config(&config.pricing));
        Ok(Self::new(config, db, dispatcher, pricing)?)
    }

    /// Validates, deduplicates, prices and persists a task, then dispatches
    /// it. Returns while the task is still `pending`, unless dispatch failed
    /// and the task was moved to `failed` on the spot.
    ///
    /// `InvalidImage` and `DuplicateImage` never leave a task row behind.
    pub async fn create_task(&self, input: InputReference) -> Result<CreatedTask, TaskError> {
        let canonical = input.canonical();

        match self.admit(&input, &canonical).await {
            Ok(()) => {}
            Err(e) => {
                self.discard_rejected(&input);
                return Err(e);
            }
        }

        let price = self.pricing.next_price();
        let task = match self.store.create(NewTask {
            original_reference: canonical.clone(),
            input_path: storage::to_forward_slashes(input.path()),
            transient: input.is_transient(),
            price,
        }) {
            Ok(task) => task,
            Err(e) => {
                if matches!(e, TaskError::DuplicateImage(_)) {
                    self.discard_rejected(&input);
                }
                return Err(e);
            }
        };

        info!(
            task_id = %task.task_id,
            filename = %sanitize::redact_path(input.path()),
            price,
            "Task created"
        );

        let job = WorkerJob {
            task_id: task.task_id.clone(),
            input_path: input.path().to_path_buf(),
            source_name: sanitize::source_name(&canonical),
            output_root: self.output_directory.clone(),
            resolutions: self.resolutions.clone(),
        };

        if let Err(source) = self.dispatcher.dispatch(job, self.completions.clone()) {
            error!(task_id = %task.task_id, error = %source, "Dispatch failed");
            let message =
                WorkerMessage::failure(&task.task_id, format!("dispatch failed: {}", source), 0);
            if let Err(e) = self.handler.apply(message) {
                error!(task_id = %task.task_id, error = %e, "Could not record dispatch failure");
                return Err(TaskError::DispatchFailure {
                    task_id: task.task_id,
                    source,
                });
            }
            return Ok(CreatedTask {
                task_id: task.task_id,
                status: TaskStatus::Failed,
                price,
            });
        }

        Ok(CreatedTask {
            task_id: task.task_id,
            status: TaskStatus::Pending,
            price,
        })
    }

    /// The image and duplicate gates, in that order.
    async fn admit(&self, input: &InputReference, canonical: &str) -> Result<(), TaskError> {
        let bytes = tokio::fs::read(input.path())
            .await
            .map_err(|e| TaskError::InvalidImage {
                reference: canonical.to_string(),
                reason: e.to_string(),
            })?;

        transform::probe(&bytes).map_err(|e| TaskError::InvalidImage {
            reference: canonical.to_string(),
            reason: e.to_string(),
        })?;

        if self.guard.is_duplicate(canonical)? {
            debug!(reference = %canonical, "Rejecting duplicate submission");
            return Err(TaskError::DuplicateImage(canonical.to_string()));
        }

        Ok(())
    }

    fn discard_rejected(&self, input: &InputReference) {
        if !input.is_transient() {
            return;
        }
        if let Err(e) = storage::remove_file(input.path()) {
            warn!(error = %e, "Failed to remove rejected upload");
        }
    }

    pub fn get_task(&self, task_id: &str) -> Result<Task, TaskError> {
        self.store
            .get(task_id)?
            .ok_or_else(|| TaskError::NotFound(task_id.to_string()))
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<(Vec<Task>, u64), TaskError> {
        Ok(self.store.list(filter)?)
    }

    /// Variants recorded for a source across all of its tasks.
    pub fn variants_for_reference(&self, reference: &str) -> Result<Vec<ImageVariant>, TaskError> {
        Ok(self.store.variants_for_reference(&canonicalize(reference))?)
    }

    /// Applies a worker message directly. Returns `false` when the task was
    /// not pending.
    pub fn apply(&self, message: WorkerMessage) -> Result<bool, TaskError> {
        Ok(self.handler.apply(message)?)
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    /// Waits until the task is terminal or `timeout` elapses, then returns
    /// its current state.
    pub async fn wait_for_task(&self, task_id: &str, timeout: Duration) -> Result<Task, TaskError> {
        let mut events = self.events.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let task = self.get_task(task_id)?;
            if task.status.is_terminal() {
                return Ok(task);
            }

            match tokio::time::timeout_at(deadline, events.recv()).await {
                Err(_) => return Ok(task),
                Ok(Ok(_)) | Ok(Err(RecvError::Lagged(_))) => continue,
                Ok(Err(RecvError::Closed)) => return self.get_task(task_id),
            }
        }
    }

    /// Stops accepting work and waits for every dispatched task to report.
    pub async fn shutdown(self) {
        let Coordinator {
            completions,
            listener,
            ..
        } = self;
        drop(completions);
        if let Err(e) = listener.await {
            error!(error = %e, "Completion listener ended abnormally");
        }
    }
}

async fn listen(mut receiver: UnboundedReceiver<WorkerMessage>, handler: CompletionHandler) {
    while let Some(message) = receiver.recv().await {
        let task_id = message.task_id().to_string();
        let handler = handler.clone();
        match tokio::task::spawn_blocking(move || handler.apply(message)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                error!(task_id = %task_id, error = %e, "Failed to apply worker message")
            }
            Err(e) => error!(task_id = %task_id, error = %e, "Completion handler panicked"),
        }
    }
    debug!("Completion listener stopped");
}
