//! Applies worker messages to the task store.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::coordinator::events::{TaskEvent, TaskEventBroadcaster};
use crate::db::DatabaseError;
use crate::storage;
use crate::task::{NewVariant, TaskStore};
use crate::worker::{VariantOutput, WorkerMessage};

#[derive(Clone)]
pub(crate) struct CompletionHandler {
    store: TaskStore,
    events: TaskEventBroadcaster,
    resolutions: Vec<u32>,
}

impl CompletionHandler {
    pub(crate) fn new(store: TaskStore, events: TaskEventBroadcaster, resolutions: Vec<u32>) -> Self {
        Self {
            store,
            events,
            resolutions,
        }
    }

    /// Applies one terminal message. Returns `false` when the task was not
    /// pending (already terminal, or unknown), in which case nothing changes.
    ///
    /// A success message that cannot be recorded still moves the task to
    /// `failed`, so a reported task never stays pending.
    pub(crate) fn apply(&self, message: WorkerMessage) -> Result<bool, DatabaseError> {
        let task_id = message.task_id().to_string();
        let processing_time_ms = Some(message.processing_time_ms());

        let event = match message {
            WorkerMessage::Completed { variants, .. } => {
                let reported: Vec<u32> = variants.iter().map(|v| v.resolution).collect();
                match self.check_resolutions(&reported) {
                    Ok(()) => self.record_completion(&task_id, variants, processing_time_ms)?,
                    Err(error) => {
                        warn!(task_id = %task_id, "{}", error);
                        self.record_failure(&task_id, &error, processing_time_ms)?
                    }
                }
            }
            WorkerMessage::Failed { error, .. } => {
                self.record_failure(&task_id, &error, processing_time_ms)?
            }
        };

        let Some(event) = event else {
            debug!(task_id = %task_id, "Ignoring message for task that is not pending");
            return Ok(false);
        };

        match &event.error {
            None => info!(
                task_id = %task_id,
                processing_time_ms = ?processing_time_ms,
                "Task completed"
            ),
            Some(error) => warn!(task_id = %task_id, error = %error, "Task failed"),
        }

        self.cleanup(&task_id);
        self.events.send(event);
        Ok(true)
    }

    /// The reported resolutions must be exactly the configured ones, each
    /// once.
    fn check_resolutions(&self, reported: &[u32]) -> Result<(), String> {
        if reported.len() != self.resolutions.len() {
            return Err(format!(
                "worker produced {} variants, expected {}",
                reported.len(),
                self.resolutions.len()
            ));
        }

        let mut seen = HashSet::with_capacity(reported.len());
        for resolution in reported {
            if !self.resolutions.contains(resolution) {
                return Err(format!("worker produced unexpected resolution {}", resolution));
            }
            if !seen.insert(*resolution) {
                return Err(format!("worker produced resolution {} twice", resolution));
            }
        }
        Ok(())
    }

    fn record_completion(
        &self,
        task_id: &str,
        variants: Vec<VariantOutput>,
        processing_time_ms: Option<u64>,
    ) -> Result<Option<TaskEvent>, DatabaseError> {
        let variants: Vec<NewVariant> = variants
            .into_iter()
            .map(|v| NewVariant {
                resolution: v.resolution,
                path: v.path,
                content_hash: v.content_hash,
            })
            .collect();

        match self.store.complete(task_id, &variants, processing_time_ms) {
            Ok(applied) => Ok(applied.then(|| TaskEvent::completed(task_id))),
            Err(e) => {
                error!(task_id = %task_id, error = %e, "Could not record variants");
                let error = format!("could not record variants: {}", e);
                self.record_failure(task_id, &error, processing_time_ms)
            }
        }
    }

    fn record_failure(
        &self,
        task_id: &str,
        error: &str,
        processing_time_ms: Option<u64>,
    ) -> Result<Option<TaskEvent>, DatabaseError> {
        Ok(self
            .store
            .fail(task_id, error, processing_time_ms)?
            .then(|| TaskEvent::failed(task_id, error)))
    }

    /// Deletes the transient input of a task that just reached a terminal
    /// state. Failures are logged and never affect the task.
    fn cleanup(&self, task_id: &str) {
        let task = match self.store.get(task_id) {
            Ok(Some(task)) => task,
            Ok(None) => return,
            Err(e) => {
                warn!(task_id = %task_id, error = %e, "Could not load task for input cleanup");
                return;
            }
        };

        if !task.transient {
            return;
        }

        match storage::remove_file(Path::new(&task.input_path)) {
            Ok(()) => debug!(task_id = %task_id, "Removed transient input"),
            Err(e) => warn!(task_id = %task_id, error = %e, "Failed to remove transient input"),
        }
    }
}
